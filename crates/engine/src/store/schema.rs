//! Versioned on-disk layout and the upgrade applied once at load time.
//!
//! Version 1 is the current layout: a document
//! `{"schema_version": 1, "groups": {"<id>": <Group>}}`.
//!
//! Version 0 is the legacy unversioned layout: a bare object mapping group id
//! to a loosely shaped record whose fields may each be missing. Upgrading
//! fills every gap with a default so the engine never has to check for
//! missing fields.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{Groups, StoreError, StoreResult};
use crate::{
    Amount, ArchivedSettlement, Clock, Expense, Group, MealSubmission, Member, Period, Settlement,
    SettlementLine,
};

pub const CURRENT_VERSION: u32 = 1;
pub const LEGACY_VERSION: u32 = 0;

const VERSION_KEY: &str = "schema_version";

#[derive(Serialize)]
struct DocumentRef<'a> {
    schema_version: u32,
    groups: &'a Groups,
}

#[derive(Deserialize)]
struct Document {
    schema_version: u32,
    #[serde(default)]
    groups: BTreeMap<String, Value>,
}

/// Serialize the whole state in the current layout.
pub fn encode_document(groups: &Groups) -> StoreResult<String> {
    Ok(serde_json::to_string_pretty(&DocumentRef {
        schema_version: CURRENT_VERSION,
        groups,
    })?)
}

/// Parse a document of any known version. Blank input is an empty ledger.
pub fn decode_document(raw: &str, clock: &dyn Clock) -> StoreResult<Groups> {
    if raw.trim().is_empty() {
        return Ok(Groups::new());
    }
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(object) = value else {
        return Err(StoreError::Malformed(
            "top-level value is not an object".to_string(),
        ));
    };

    let (version, groups) = if object.contains_key(VERSION_KEY) {
        let document: Document = serde_json::from_value(Value::Object(object))?;
        (document.schema_version, document.groups)
    } else {
        (LEGACY_VERSION, object.into_iter().collect())
    };
    if version > CURRENT_VERSION {
        return Err(StoreError::UnsupportedVersion(version));
    }

    groups
        .into_iter()
        .map(|(id, value)| {
            let group = upgrade_group(version, &id, value, clock)?;
            Ok((id, group))
        })
        .collect()
}

/// Serialize one group in the current layout.
pub fn encode_group(group: &Group) -> StoreResult<String> {
    Ok(serde_json::to_string(group)?)
}

/// Bring one stored group written with `version` up to the current model.
pub fn upgrade_group(
    version: u32,
    id: &str,
    value: Value,
    clock: &dyn Clock,
) -> StoreResult<Group> {
    let mut group = match version {
        LEGACY_VERSION => {
            serde_json::from_value::<LegacyGroup>(value)?.upgrade(id, clock.now(), clock.today())
        }
        CURRENT_VERSION => serde_json::from_value::<Group>(value)?,
        other => return Err(StoreError::UnsupportedVersion(other)),
    };
    group.id = id.to_string();
    Ok(group)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyGroup {
    group_name: String,
    members: BTreeMap<String, LegacyMember>,
    expenses: Vec<LegacyExpense>,
    meal_counts: BTreeMap<String, LegacyMeals>,
    current_month: Option<String>,
    settlements: Vec<LegacyArchive>,
    carry_forward: f64,
    created_date: Option<String>,
    meal_data_submitted: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyMember {
    name: String,
    username: String,
    joined_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyExpense {
    amount: f64,
    description: String,
    added_by: String,
    #[serde(deserialize_with = "id_string")]
    added_by_id: String,
    date: Option<String>,
    month: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyMeals {
    data: BTreeMap<String, u32>,
    submitted_by: String,
    submitted_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyArchive {
    settlement: LegacySettlement,
    archived_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacySettlement {
    month: Option<String>,
    carry_forward: f64,
    total_expenses: f64,
    total_with_carry: f64,
    total_meals: u64,
    cost_per_meal: f64,
    settlements: Vec<LegacyLine>,
    remaining: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyLine {
    #[serde(deserialize_with = "id_string")]
    user_id: String,
    name: String,
    spent: f64,
    meals: u32,
    owes: f64,
    balance: f64,
}

/// Legacy ids were written either as strings or as bare integers.
fn id_string<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Legacy timestamps are naive local strings; they are read as UTC.
fn legacy_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

fn legacy_period(raw: Option<&str>) -> Option<Period> {
    raw?.parse().ok()
}

impl LegacyGroup {
    fn upgrade(self, id: &str, now: DateTime<Utc>, today: NaiveDate) -> Group {
        // A month reset left `current_month` on the month it closed; the
        // calendar month is the live one then.
        let calendar = Period::containing(today);
        let current_period = legacy_period(self.current_month.as_deref())
            .map_or(calendar, |stored| stored.max(calendar));
        let submitted = self.meal_data_submitted != Some(false);

        let members = self
            .members
            .into_iter()
            .map(|(member_id, member)| {
                let handle = Some(member.username).filter(|h| !h.is_empty());
                let member = Member {
                    id: member_id.clone(),
                    display_name: member.name,
                    handle,
                    joined_at: legacy_timestamp(member.joined_date.as_deref()).unwrap_or(now),
                };
                (member_id, member)
            })
            .collect();

        let expenses = self
            .expenses
            .into_iter()
            .map(|expense| {
                let recorded_at = legacy_timestamp(expense.date.as_deref());
                // Without a month tag, the recording date decides the period.
                let period = legacy_period(expense.month.as_deref())
                    .or_else(|| recorded_at.map(|at| Period::at(&at)))
                    .unwrap_or(current_period);
                Expense {
                    id: Uuid::new_v4(),
                    amount: Amount::new(expense.amount),
                    description: expense.description,
                    recorded_by: expense.added_by,
                    recorded_by_member_id: expense.added_by_id,
                    recorded_at: recorded_at.unwrap_or(now),
                    period,
                }
            })
            .collect();

        let meals = self
            .meal_counts
            .into_iter()
            .filter(|_| submitted)
            .find(|(month, _)| legacy_period(Some(month.as_str())) == Some(current_period))
            .map(|(_, entry)| MealSubmission {
                period: current_period,
                counts: entry.data,
                submitted_by: entry.submitted_by,
                submitted_at: legacy_timestamp(entry.submitted_date.as_deref()).unwrap_or(now),
            });

        let archived_settlements = self
            .settlements
            .into_iter()
            .map(|archive| {
                let archived_at = legacy_timestamp(archive.archived_date.as_deref()).unwrap_or(now);
                ArchivedSettlement {
                    archived_at,
                    settlement: archive.settlement.upgrade(Period::at(&archived_at)),
                }
            })
            .collect();

        Group {
            id: id.to_string(),
            name: self.group_name,
            created_at: legacy_timestamp(self.created_date.as_deref()).unwrap_or(now),
            members,
            expenses,
            meals,
            current_period,
            carry_forward: Amount::new(self.carry_forward),
            archived_settlements,
        }
    }
}

impl LegacySettlement {
    fn upgrade(self, fallback_period: Period) -> Settlement {
        Settlement {
            period: legacy_period(self.month.as_deref()).unwrap_or(fallback_period),
            carry_forward_in: Amount::new(self.carry_forward),
            total_expenses: Amount::new(self.total_expenses),
            total_with_carry: Amount::new(self.total_with_carry),
            total_meals: self.total_meals,
            cost_per_meal: Amount::new(self.cost_per_meal),
            lines: self
                .settlements
                .into_iter()
                .map(|line| SettlementLine {
                    member_id: line.user_id,
                    name: line.name,
                    spent: Amount::new(line.spent),
                    meals: line.meals,
                    owes: Amount::new(line.owes),
                    balance: Amount::new(line.balance),
                })
                .collect(),
            remainder: Amount::new(self.remaining),
        }
    }
}
