use serde::{Deserialize, Serialize};

/// Snapshot of an owner's storage budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaStatus {
    pub used: u64,
    pub quota: u64,
    pub remaining: i64, // -1 = unlimited
    pub percent: f64,
}

impl QuotaStatus {
    pub fn new(used: u64, quota: u64) -> Self {
        if quota == 0 {
            return QuotaStatus { used, quota, remaining: -1, percent: 0.0 };
        }

        QuotaStatus {
            used,
            quota,
            remaining: quota.saturating_sub(used) as i64,
            percent: used as f64 / quota as f64 * 100.0,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.quota == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageStats {
    pub image_count: u64,
    pub storage_used: u64,
    pub storage_quota: u64,
    pub remaining_quota: i64,
    pub quota_percent: f64,
    pub total_views: u64,
}

impl UsageStats {
    pub fn new(image_count: u64, total_views: u64, quota: &QuotaStatus) -> Self {
        UsageStats {
            image_count,
            storage_used: quota.used,
            storage_quota: quota.quota,
            remaining_quota: quota.remaining,
            quota_percent: quota.percent,
            total_views,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_quota_reports_minus_one() {
        let status = QuotaStatus::new(5_000, 0);
        assert_eq!(status.remaining, -1);
        assert_eq!(status.percent, 0.0);
        assert!(status.is_unlimited());
    }

    #[test]
    fn limited_quota_reports_remaining_and_percent() {
        let status = QuotaStatus::new(900, 1000);
        assert_eq!(status.remaining, 100);
        assert!((status.percent - 90.0).abs() < f64::EPSILON);
    }
}
