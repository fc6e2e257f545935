//! Daily jobs: meal-count reminders before period end and the period-end
//! settlement with rotation.
use std::{error::Error, sync::Arc};

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use engine::{Engine, EngineError, Rotation, Settlement, days_left_in_period, is_period_end, is_reminder_day};
use tokio::sync::Mutex;

use crate::settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Reminder,
    Settlement,
}

/// What the period-end job did with one group.
#[derive(Debug, PartialEq)]
pub enum Closing {
    /// Nobody submitted meal counts; the period stays open.
    Skipped,
    Rotated(Rotation),
}

pub struct Scheduler {
    engine: Arc<Mutex<Engine>>,
    tz: Tz,
    reminder_days_before: u32,
    reminder_time: NaiveTime,
    settlement_time: NaiveTime,
}

impl Scheduler {
    pub fn new(
        engine: Arc<Mutex<Engine>>,
        tz: Tz,
        config: &settings::Scheduler,
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self {
            engine,
            tz,
            reminder_days_before: config.reminder_days_before,
            reminder_time: parse_time(&config.reminder_time)?,
            settlement_time: parse_time(&config.settlement_time)?,
        })
    }

    pub async fn run(self) {
        tracing::info!(
            "scheduler running in {}: reminders at {} ({} day(s) before period end), settlement at {}",
            self.tz,
            self.reminder_time.format("%H:%M"),
            self.reminder_days_before,
            self.settlement_time.format("%H:%M"),
        );

        loop {
            let now = Utc::now().with_timezone(&self.tz);
            let (job, at) = self.next_job(&now);
            let wait = (at.clone() - now).to_std().unwrap_or_default();
            tracing::debug!("next job {job:?} at {at}");
            tokio::time::sleep(wait).await;

            let today = at.date_naive();
            match job {
                Job::Reminder if is_reminder_day(today, self.reminder_days_before) => {
                    self.remind(today).await
                }
                Job::Settlement if is_period_end(today) => self.settle().await,
                _ => {}
            }
        }
    }

    fn next_job(&self, now: &DateTime<Tz>) -> (Job, DateTime<Tz>) {
        let reminder = next_fire(now, self.reminder_time);
        let settlement = next_fire(now, self.settlement_time);
        if settlement <= reminder {
            (Job::Settlement, settlement)
        } else {
            (Job::Reminder, reminder)
        }
    }

    async fn remind(&self, today: NaiveDate) {
        let engine = self.engine.lock().await;
        let days_left = days_left_in_period(today);
        for group_id in engine.list_groups() {
            if engine.meal_data_submitted(&group_id) {
                continue;
            }
            tracing::warn!(
                "group {group_id}: meal counts for {} still missing, {days_left} day(s) left",
                engine.current_period(&group_id),
            );
        }
    }

    async fn settle(&self) {
        let mut engine = self.engine.lock().await;
        close_all_periods(&mut engine).await;
    }
}

/// Runs the period-end job for every group. A failing group is logged and
/// the remaining groups still run.
pub async fn close_all_periods(engine: &mut Engine) -> Vec<(String, Result<Closing, EngineError>)> {
    let mut outcomes = Vec::new();
    for group_id in engine.list_groups() {
        let outcome = close_period(engine, &group_id).await;
        match &outcome {
            Ok(Closing::Skipped) => {
                tracing::warn!("group {group_id}: no meal counts submitted, period left open")
            }
            Ok(Closing::Rotated(rotation)) => {
                tracing::info!("group {group_id}: opened {}", rotation.opened)
            }
            Err(err) => tracing::error!("group {group_id}: period-end job failed: {err}"),
        }
        outcomes.push((group_id, outcome));
    }
    outcomes
}

/// Runs the period-end job for one group: report the settlement, then
/// rotate. Groups without a meal submission are left untouched.
pub async fn close_period(engine: &mut Engine, group_id: &str) -> Result<Closing, EngineError> {
    if !engine.meal_data_submitted(group_id) {
        return Ok(Closing::Skipped);
    }

    match engine.compute_settlement(group_id) {
        Ok(settlement) => tracing::info!("group {group_id}:\n{}", report(&settlement)),
        Err(err) => tracing::warn!("group {group_id}: no settlement: {err}"),
    }

    Ok(Closing::Rotated(engine.rotate_period(group_id).await?))
}

fn report(settlement: &Settlement) -> String {
    let mut lines = vec![
        format!("settlement for {}", settlement.period),
        format!(
            "expenses {} + carry forward {} = {}",
            settlement.total_expenses, settlement.carry_forward_in, settlement.total_with_carry
        ),
        format!(
            "{} meal(s), {} per meal",
            settlement.total_meals, settlement.cost_per_meal
        ),
    ];
    for line in settlement.by_balance() {
        lines.push(format!(
            "  {}: spent {}, {} meal(s), owes {}, balance {}",
            line.name, line.spent, line.meals, line.owes, line.balance
        ));
    }
    lines.push(format!("remainder {}", settlement.remainder));
    lines.join("\n")
}

fn parse_time(raw: &str) -> Result<NaiveTime, Box<dyn Error + Send + Sync>> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|err| format!("invalid time of day {raw:?}: {err}").into())
}

/// Next instant strictly after `now` at local time `at`. A time skipped by a
/// DST jump fires at the first valid instant after it.
fn next_fire(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut date = now.date_naive();
    loop {
        if let Some(candidate) = local_instant(&tz, date, at)
            && candidate > *now
        {
            return candidate;
        }
        date = match date.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => return now.clone(),
        };
    }
}

fn local_instant(tz: &Tz, date: NaiveDate, at: NaiveTime) -> Option<DateTime<Tz>> {
    let naive = date.and_time(at);
    tz.from_local_datetime(&naive).earliest().or_else(|| {
        let shifted = naive + chrono::Duration::hours(1);
        tz.from_local_datetime(&shifted).earliest()
    })
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::atomic::{AtomicBool, Ordering},
    };

    use async_trait::async_trait;
    use chrono::TimeZone;
    use engine::{
        Amount, Clock, ManualClock, MemoryStore, Period, Store, StoreError,
        store::{Groups, StoreResult},
    };

    use super::*;

    fn dhaka(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        chrono_tz::Asia::Dhaka
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    fn time(raw: &str) -> NaiveTime {
        parse_time(raw).unwrap()
    }

    async fn engine_at(now: DateTime<Utc>) -> Engine {
        Engine::builder()
            .store(MemoryStore::new())
            .clock(Arc::new(ManualClock::new(now)))
            .build()
            .await
            .unwrap()
    }

    #[test]
    fn fires_later_today_or_tomorrow() {
        let now = dhaka(2025, 5, 28, 9, 0);
        assert_eq!(next_fire(&now, time("10:00")), dhaka(2025, 5, 28, 10, 0));
        assert_eq!(next_fire(&now, time("09:00")), dhaka(2025, 5, 29, 9, 0));
        assert_eq!(next_fire(&now, time("08:30")), dhaka(2025, 5, 29, 8, 30));
    }

    #[test]
    fn skipped_local_time_fires_after_the_gap() {
        // Clocks in Berlin jump from 02:00 to 03:00 on 2025-03-30.
        let berlin = chrono_tz::Europe::Berlin;
        let now = berlin.with_ymd_and_hms(2025, 3, 30, 0, 0, 0).unwrap();
        let fire = next_fire(&now, time("02:30"));
        assert_eq!(fire, berlin.with_ymd_and_hms(2025, 3, 30, 3, 30, 0).unwrap());
    }

    #[test]
    fn rejects_bad_time_of_day() {
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("noon").is_err());
    }

    #[tokio::test]
    async fn picks_earliest_job() {
        let engine = Arc::new(Mutex::new(engine_at(Utc::now()).await));
        let scheduler = Scheduler::new(
            engine,
            chrono_tz::Asia::Dhaka,
            &settings::Scheduler::default(),
        )
        .unwrap();

        let morning = dhaka(2025, 5, 31, 8, 0);
        assert_eq!(
            scheduler.next_job(&morning),
            (Job::Reminder, dhaka(2025, 5, 31, 10, 0))
        );
        let noon = dhaka(2025, 5, 31, 12, 0);
        assert_eq!(
            scheduler.next_job(&noon),
            (Job::Settlement, dhaka(2025, 5, 31, 23, 59))
        );
    }

    #[tokio::test]
    async fn period_end_skips_groups_without_meal_counts() {
        let mut engine = engine_at(Utc.with_ymd_and_hms(2025, 5, 31, 23, 59, 0).unwrap()).await;
        engine
            .record_expense("g", Amount::new(100.0), "rice", "Alice", "u1")
            .await
            .unwrap();

        assert_eq!(close_period(&mut engine, "g").await.unwrap(), Closing::Skipped);
        assert_eq!(engine.current_period("g"), Period::new(2025, 5).unwrap());
        assert_eq!(engine.current_period_expenses("g").len(), 1);
    }

    #[tokio::test]
    async fn period_end_archives_and_rotates() {
        let mut engine = engine_at(Utc.with_ymd_and_hms(2025, 5, 31, 23, 59, 0).unwrap()).await;
        engine
            .record_expense("g", Amount::new(300.0), "rice", "Alice", "u1")
            .await
            .unwrap();
        engine
            .submit_meal_counts(
                "g",
                BTreeMap::from([("u1".to_string(), 20), ("u2".to_string(), 10)]),
                "Alice",
            )
            .await
            .unwrap();

        let Closing::Rotated(rotation) = close_period(&mut engine, "g").await.unwrap() else {
            panic!("expected a rotation");
        };
        assert_eq!(rotation.opened, Period::new(2025, 6).unwrap());
        let settlement = rotation.archived().unwrap();
        assert_eq!(settlement.cost_per_meal, Amount::new(10.0));
        assert_eq!(engine.archived_settlements("g").len(), 1);
        assert!(!engine.meal_data_submitted("g"));
    }

    /// Memory store whose next save fails once armed.
    #[derive(Clone, Debug, Default)]
    struct FlakyStore {
        inner: MemoryStore,
        armed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn load(&self, clock: &dyn Clock) -> StoreResult<Groups> {
            self.inner.load(clock).await
        }

        async fn save(&self, groups: &Groups) -> StoreResult<()> {
            if self.armed.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.save(groups).await
        }
    }

    #[tokio::test]
    async fn failing_group_does_not_stop_the_others() {
        let store = FlakyStore::default();
        let mut engine = Engine::builder()
            .store(store.clone())
            .clock(Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2025, 5, 31, 23, 59, 0).unwrap(),
            )))
            .build()
            .await
            .unwrap();
        for group_id in ["a", "b", "c"] {
            engine
                .record_expense(group_id, Amount::new(90.0), "rice", "Alice", "u1")
                .await
                .unwrap();
            engine
                .submit_meal_counts(group_id, BTreeMap::from([("u1".to_string(), 9)]), "Alice")
                .await
                .unwrap();
        }

        store.armed.store(true, Ordering::SeqCst);
        let outcomes = close_all_periods(&mut engine).await;

        let ids: Vec<_> = outcomes.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(matches!(outcomes[0].1, Err(EngineError::Persistence(_))));
        assert!(matches!(outcomes[1].1, Ok(Closing::Rotated(_))));
        assert!(matches!(outcomes[2].1, Ok(Closing::Rotated(_))));
        assert_eq!(engine.archived_settlements("c").len(), 1);
        assert_eq!(store.inner.snapshot()["c"].archived_settlements.len(), 1);
    }

    #[test]
    fn report_lists_members_by_balance() {
        let settlement = Settlement {
            period: Period::new(2025, 5).unwrap(),
            carry_forward_in: Amount::ZERO,
            total_expenses: Amount::new(300.0),
            total_with_carry: Amount::new(300.0),
            total_meals: 30,
            cost_per_meal: Amount::new(10.0),
            lines: vec![
                engine::SettlementLine {
                    member_id: "u2".to_string(),
                    name: "Bob".to_string(),
                    spent: Amount::ZERO,
                    meals: 10,
                    owes: Amount::new(100.0),
                    balance: Amount::new(-100.0),
                },
                engine::SettlementLine {
                    member_id: "u1".to_string(),
                    name: "Alice".to_string(),
                    spent: Amount::new(300.0),
                    meals: 20,
                    owes: Amount::new(200.0),
                    balance: Amount::new(100.0),
                },
            ],
            remainder: Amount::ZERO,
        };

        let text = report(&settlement);
        let alice = text.find("Alice").unwrap();
        let bob = text.find("Bob").unwrap();
        assert!(alice < bob);
        assert!(text.contains("10.00 per meal"));
    }
}
