//! CSV export of the current period

use csv::Writer;
use engine::Engine;
use serde::Serialize;

#[derive(Serialize)]
struct ExportRow {
    kind: &'static str,
    member_id: String,
    name: String,
    amount: Option<String>,
    meals: Option<u32>,
    description: Option<String>,
    recorded_at: Option<String>,
    id: Option<String>,
}

/// Expenses in recording order, then one row per meal count. `None` when the
/// period holds neither.
pub fn current_period_csv(engine: &Engine, group_id: &str) -> Result<Option<Vec<u8>>, csv::Error> {
    let group = engine.group_snapshot(group_id);
    let expenses: Vec<_> = group.current_expenses().collect();
    let meals = group.current_meals();
    if expenses.is_empty() && meals.is_none() {
        return Ok(None);
    }

    let mut writer = Writer::from_writer(vec![]);
    for expense in expenses {
        writer.serialize(ExportRow {
            kind: "expense",
            member_id: expense.recorded_by_member_id.clone(),
            name: group.display_name(&expense.recorded_by_member_id, Some(&expense.recorded_by)),
            amount: Some(expense.amount.to_string()),
            meals: None,
            description: Some(expense.description.clone()),
            recorded_at: Some(expense.recorded_at.to_rfc3339()),
            id: Some(expense.id.to_string()),
        })?;
    }
    for (member_id, count) in meals.into_iter().flat_map(|submission| &submission.counts) {
        writer.serialize(ExportRow {
            kind: "meals",
            member_id: member_id.clone(),
            name: group.display_name(member_id, None),
            amount: None,
            meals: Some(*count),
            description: None,
            recorded_at: None,
            id: None,
        })?;
    }

    let data = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    Ok(Some(data))
}
