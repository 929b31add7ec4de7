//! IdGenerator port - ID 生成の抽象化
//!
//! JobId はそのまま出力ファイル名のトークンにもなるので、
//! 連続した呼び出しでも並行呼び出しでも衝突しないことが前提です。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::JobId;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は JobId を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（並行ジョブから共有される）
pub trait IdGenerator: Send + Sync {
    fn generate_job_id(&self) -> JobId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// 時刻部分は Clock から取るので、FixedClock を使えば timestamp を固定できます。
/// 残り 80 bit はランダムなので、同じミリ秒内でも ID は分かれます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_job_id(&self) -> JobId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        JobId::from(ulid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let ids: HashSet<_> = (0..1000).map(|_| id_gen.generate_job_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_job_id();
        let id2 = id_gen.generate_job_id();

        // 同じ時刻でもランダム部分で区別される
        assert_ne!(id1, id2);
        assert_ne!(id1.token(), id2.token());

        assert_eq!(id1.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(id2.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
