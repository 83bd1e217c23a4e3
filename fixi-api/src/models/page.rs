use serde::{Deserialize, Deserializer, Serialize};

/// 1ページ分の検索結果
///
/// デシリアライズ時に `items.len() <= count` と `total_count >= items.len()` を
/// 検証する。満たさないページはレスポンス不正として扱われる。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    /// 1始まりのページ番号
    pub page: u32,
    /// 1ページあたりの件数
    pub count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPageWire<T> {
    items: Vec<T>,
    total_count: u64,
    page: u32,
    count: u32,
}

impl<T> ListPage<T> {
    pub fn new(items: Vec<T>, total_count: u64, page: u32, count: u32) -> Result<Self, String> {
        if items.len() > count as usize {
            return Err(format!(
                "page holds {} items but page size is {}",
                items.len(),
                count
            ));
        }
        if total_count < items.len() as u64 {
            return Err(format!(
                "total count {} is less than the {} items on the page",
                total_count,
                items.len()
            ));
        }
        Ok(Self {
            items,
            total_count,
            page,
            count,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 総ページ数
    pub fn page_count(&self) -> u64 {
        if self.count == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.count as u64)
    }

    pub fn has_next_page(&self) -> bool {
        (self.page as u64) < self.page_count()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> IntoIterator for ListPage<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'de, T> Deserialize<'de> for ListPage<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = ListPageWire::<T>::deserialize(deserializer)?;
        ListPage::new(wire.items, wire.total_count, wire.page, wire.count)
            .map_err(serde::de::Error::custom)
    }
}
