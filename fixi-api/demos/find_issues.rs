/// Fixi Issue検索の使用例
///
/// 実行前に環境変数を設定してください：
/// export FIXI_URL=https://fixi.example.com/api
/// export FIXI_TOKEN=your-api-token
///
/// 実行方法：
/// cargo run --example find_issues
use dotenv::dotenv;
use fixi_api::{
    CancellationToken, FindIssuesParams, FixiClient, FixiConfig, IssuesApi, NearbyIssuesParams,
    SortOrder, Status,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = FixiConfig::from_env()
        .map_err(|e| format!("環境変数が設定されていません: {}", e))?;
    let client = FixiClient::new(config)?;
    let cancel = CancellationToken::new();

    // Ctrl+C で実行中の呼び出しをキャンセル
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    println!("📋 1. 未対応のIssue");
    let params = FindIssuesParams::new()
        .add_status(Status::Open)
        .add_status(Status::InProgress)
        .count(10);
    let page = client.find(&params, &cancel).await?;
    println!(
        "   📊 総件数: {} 件 ({}/{} ページ)",
        page.total_count,
        page.page,
        page.page_count()
    );
    for issue in page.iter() {
        println!(
            "   🎫 {} [{}] {} - {}",
            issue.id,
            issue.status,
            issue.category,
            issue.description
        );
    }

    println!("\n📍 2. 周辺のIssue");
    let nearby = NearbyIssuesParams::new(52.0907, 5.1214, 500.0).sort(SortOrder::Distance);
    match client.nearby(&nearby, &cancel).await {
        Ok(page) => {
            for issue in page.iter().take(5) {
                let address = issue.address.as_deref().unwrap_or("住所なし");
                println!("   🎫 {} - {} ({})", issue.id, issue.description, address);
            }
        }
        Err(e) => println!("   ❌ 取得に失敗しました: {}", e),
    }

    if let Some(first) = page.items.first() {
        println!("\n🔍 3. Issueの詳細: {}", first.id);
        let issue = client.get(&first.id, &cancel).await?;
        println!("   作成日時: {}", issue.created);
        if let Some(assignee) = &issue.assigned_to {
            println!("   担当: {}", assignee);
        }
    }

    Ok(())
}
