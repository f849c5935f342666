//! 开奖时间计算。
//! 纯函数: 同一时刻调用任意多次, 结果一致。

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Utc, Weekday};

/// 按星期序号 (0 = 周一) 取 chrono Weekday
fn weekday_from_index(idx: u8) -> Weekday {
    match idx % 7 {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

/// 计算下一个开奖时刻 (UTC)。
///
/// 规则: 在固定时区 (默认 IST, UTC+05:30) 下找下一个目标星期的
/// 截止时刻 (默认周四 18:30); 若今天就是目标星期但已过截止时刻,
/// 顺延整 7 天。
pub fn next_draw_date(
    now_utc: DateTime<Utc>,
    weekday_idx: u8,
    hour: u32,
    minute: u32,
    tz_offset_minutes: i32,
) -> DateTime<Utc> {
    let tz = FixedOffset::east_opt(tz_offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    let now_local = now_utc.with_timezone(&tz);

    let target = weekday_from_index(weekday_idx);
    let cutoff = NaiveTime::from_hms_opt(hour, minute, 0)
        .unwrap_or_else(|| NaiveTime::from_hms_opt(18, 30, 0).expect("valid fallback time"));

    let days_ahead = (target.num_days_from_monday() as i64
        - now_local.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);

    let mut target_date = now_local.date_naive() + Duration::days(days_ahead);
    if days_ahead == 0 && now_local.time() >= cutoff {
        target_date += Duration::days(7);
    }

    let local_dt = target_date.and_time(cutoff);
    // 固定偏移时区不存在歧义/缺失的本地时间
    tz.from_local_datetime(&local_dt)
        .single()
        .expect("fixed-offset local datetime is unambiguous")
        .with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const IST_MINUTES: i32 = 330;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_opt(h, mi, 0)
                .unwrap(),
        )
    }

    /// IST 18:30 == UTC 13:00
    #[test]
    fn test_monday_rolls_to_same_week_thursday() {
        // 2025-06-02 是周一
        let now = utc(2025, 6, 2, 8, 0);
        let next = next_draw_date(now, 3, 18, 30, IST_MINUTES);
        assert_eq!(next, utc(2025, 6, 5, 13, 0));
    }

    #[test]
    fn test_thursday_before_cutoff_stays_today() {
        // 2025-06-05 是周四, IST 12:00 (UTC 06:30) 尚未到 18:30
        let now = utc(2025, 6, 5, 6, 30);
        let next = next_draw_date(now, 3, 18, 30, IST_MINUTES);
        assert_eq!(next, utc(2025, 6, 5, 13, 0));
    }

    #[test]
    fn test_thursday_after_cutoff_rolls_seven_days() {
        // 周四 IST 19:00 (UTC 13:30) 已过截止, 顺延到下周四
        let now = utc(2025, 6, 5, 13, 30);
        let next = next_draw_date(now, 3, 18, 30, IST_MINUTES);
        assert_eq!(next, utc(2025, 6, 12, 13, 0));
    }

    #[test]
    fn test_thursday_exactly_at_cutoff_rolls_forward() {
        let now = utc(2025, 6, 5, 13, 0);
        let next = next_draw_date(now, 3, 18, 30, IST_MINUTES);
        assert_eq!(next, utc(2025, 6, 12, 13, 0));
    }

    #[test]
    fn test_friday_rolls_to_next_week() {
        // 2025-06-06 是周五
        let now = utc(2025, 6, 6, 10, 0);
        let next = next_draw_date(now, 3, 18, 30, IST_MINUTES);
        assert_eq!(next, utc(2025, 6, 12, 13, 0));
    }

    #[test]
    fn test_idempotent_at_same_instant() {
        let now = utc(2025, 6, 4, 23, 59);
        assert_eq!(
            next_draw_date(now, 3, 18, 30, IST_MINUTES),
            next_draw_date(now, 3, 18, 30, IST_MINUTES)
        );
    }

    /// UTC 与 IST 跨日: 周三 UTC 20:00 在 IST 已是周四凌晨
    #[test]
    fn test_timezone_day_boundary() {
        let now = utc(2025, 6, 4, 20, 0);
        let next = next_draw_date(now, 3, 18, 30, IST_MINUTES);
        assert_eq!(next, utc(2025, 6, 5, 13, 0));
    }

    #[test]
    fn test_result_is_always_in_future() {
        let samples = [
            utc(2025, 1, 1, 0, 0),
            utc(2025, 6, 5, 12, 59),
            utc(2025, 6, 5, 13, 1),
            utc(2025, 12, 31, 23, 59),
        ];
        for now in samples {
            assert!(next_draw_date(now, 3, 18, 30, IST_MINUTES) > now);
        }
    }
}
