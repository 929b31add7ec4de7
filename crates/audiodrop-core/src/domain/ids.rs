//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID を Phantom type パターンで型付けしています。
//!
//! ## ULID を使う理由
//! - **時刻でソート可能**: ログや scratch ディレクトリの中身が生成順に並ぶ
//! - **調整なしで生成可能**: 並行に走る変換ジョブ同士でロック不要
//! - **衝突しない**: 同じ秒に投入されたジョブでも出力パスが被らない

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// Display で使うプレフィックス（例: "job-"）
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しません。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Lowercase token usable inside file names.
    pub fn token(&self) -> String {
        self.ulid.to_string().to_lowercase()
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Job のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Job {}

impl IdMarker for Job {
    fn prefix() -> &'static str {
        "job-"
    }
}

/// Identifier of one conversion job (one incoming URL).
pub type JobId = Id<Job>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_display_has_prefix() {
        let ulid = Ulid::new();
        let job = JobId::from_ulid(ulid);

        assert_eq!(job.as_ulid(), ulid);
        assert!(job.to_string().starts_with("job-"));
    }

    #[test]
    fn token_is_lowercase_and_file_safe() {
        let job = JobId::from_ulid(Ulid::new());
        let token = job.token();

        assert_eq!(token.len(), 26);
        assert!(token.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn ulid_ids_are_sortable() {
        let id1 = JobId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = JobId::from_ulid(Ulid::new());

        assert!(id1 < id2);
        assert!(id1.token() < id2.token());
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<JobId>(), size_of::<Ulid>());
    }
}
