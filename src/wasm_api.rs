use crate::{
    Card, Error, Hand, Meld, Objective, Run, Set, Table, UpdateAssignment, iter_melds,
    iter_updates_multi,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// JSON form of a meld: each set and run as a list of card strings
#[derive(Serialize, Deserialize)]
pub struct MeldJson {
    #[serde(default)]
    pub sets: Vec<Vec<String>>,
    #[serde(default)]
    pub runs: Vec<Vec<String>>,
}

/// One seat's meld on the table
#[derive(Serialize, Deserialize)]
pub struct SeatJson {
    pub seat: usize,
    pub meld: MeldJson,
}

#[derive(Serialize)]
pub struct MeldsResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub melds: Option<Vec<MeldJson>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// False when the time limit cut the enumeration short
    pub search_completed: bool,
    pub elapsed_ms: f64,
}

#[derive(Serialize)]
pub struct UpdatesResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updates: Option<Vec<UpdateAssignment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub search_completed: bool,
    pub elapsed_ms: f64,
}

/// Wall-clock budget for one call
struct Deadline {
    start_ms: f64,
    limit_ms: u64,
}

impl Deadline {
    fn new(limit_ms: u64) -> Self {
        Deadline {
            start_ms: js_sys::Date::now(),
            limit_ms,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        js_sys::Date::now() - self.start_ms
    }

    fn is_expired(&self) -> bool {
        self.limit_ms > 0 && self.elapsed_ms() >= self.limit_ms as f64
    }
}

/// Enumerate every meld of a hand for a contract
///
/// # Arguments
/// * `hand_cards` - JSON array of card strings (e.g., ["7S", "10H", "*"])
/// * `sets`, `runs` - the contract, e.g. 1 and 1
/// * `time_limit_ms` - stop after this long; 0 for no limit
///
/// # Returns
/// JSON string with MeldsResult
#[wasm_bindgen]
pub fn enumerate_melds(hand_cards: &str, sets: u8, runs: u8, time_limit_ms: u64) -> String {
    let deadline = Deadline::new(time_limit_ms);
    let result = match melds_internal(hand_cards, sets, runs, &deadline) {
        Ok((melds, search_completed)) => MeldsResult {
            success: true,
            melds: Some(melds),
            error: None,
            search_completed,
            elapsed_ms: deadline.elapsed_ms(),
        },
        Err(e) => MeldsResult {
            success: false,
            melds: None,
            error: Some(e.to_string()),
            search_completed: false,
            elapsed_ms: deadline.elapsed_ms(),
        },
    };
    serde_json::to_string(&result)
        .unwrap_or_else(|e| format!(r#"{{"success":false,"error":"Serialization error: {}"}}"#, e))
}

/// Enumerate every way to lay cards off onto the table
///
/// # Arguments
/// * `hand_cards` - JSON array of card strings
/// * `table_melds` - JSON array of seats, e.g.
///   `[{"seat": 0, "meld": {"sets": [["7S","7D","7H"]], "runs": [["2H","3H","4H","5H"]]}}]`
/// * `time_limit_ms` - stop after this long; 0 for no limit
#[wasm_bindgen]
pub fn enumerate_updates(hand_cards: &str, table_melds: &str, time_limit_ms: u64) -> String {
    let deadline = Deadline::new(time_limit_ms);
    let result = match updates_internal(hand_cards, table_melds, &deadline) {
        Ok((updates, search_completed)) => UpdatesResult {
            success: true,
            updates: Some(updates),
            error: None,
            search_completed,
            elapsed_ms: deadline.elapsed_ms(),
        },
        Err(e) => UpdatesResult {
            success: false,
            updates: None,
            error: Some(e.to_string()),
            search_completed: false,
            elapsed_ms: deadline.elapsed_ms(),
        },
    };
    serde_json::to_string(&result)
        .unwrap_or_else(|e| format!(r#"{{"success":false,"error":"Serialization error: {}"}}"#, e))
}

fn parse_hand(hand_cards: &str) -> Result<Hand, Error> {
    let cards: Vec<Card> = serde_json::from_str(hand_cards)?;
    Ok(cards.into_iter().collect())
}

fn parse_cards(cards: &[String]) -> Result<Vec<Card>, Error> {
    cards.iter().map(|c| c.parse()).collect()
}

fn meld_from_json(meld: &MeldJson) -> Result<Meld, Error> {
    let sets = meld
        .sets
        .iter()
        .map(|cards| Set::new(parse_cards(cards)?))
        .collect::<Result<Vec<_>, Error>>()?;
    let runs = meld
        .runs
        .iter()
        .map(|cards| Run::new(parse_cards(cards)?))
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(Meld::new(sets, runs))
}

fn meld_to_json(meld: &Meld) -> MeldJson {
    let strings = |cards: &[Card]| -> Vec<String> { cards.iter().map(|c| c.to_string()).collect() };
    MeldJson {
        sets: meld.sets().iter().map(|s| strings(s.cards())).collect(),
        runs: meld.runs().iter().map(|r| strings(r.cards())).collect(),
    }
}

/// Drain `iter` until it ends or the deadline passes
fn collect_until<T>(iter: impl Iterator<Item = T>, deadline: &Deadline) -> (Vec<T>, bool) {
    let mut items = Vec::new();
    for item in iter {
        items.push(item);
        if deadline.is_expired() {
            return (items, false);
        }
    }
    (items, true)
}

fn melds_internal(
    hand_cards: &str,
    sets: u8,
    runs: u8,
    deadline: &Deadline,
) -> Result<(Vec<MeldJson>, bool), Error> {
    let hand = parse_hand(hand_cards)?;
    let objective = Objective::new(sets, runs)?;
    // lazy, so the deadline bounds the search and not just the copy out
    let (melds, completed) = collect_until(iter_melds(&hand, objective), deadline);
    Ok((melds.iter().map(meld_to_json).collect(), completed))
}

fn updates_internal(
    hand_cards: &str,
    table_melds: &str,
    deadline: &Deadline,
) -> Result<(Vec<UpdateAssignment>, bool), Error> {
    let hand = parse_hand(hand_cards)?;
    let seats: Vec<SeatJson> = serde_json::from_str(table_melds)?;
    let mut table = Table::new();
    for seat in &seats {
        table.lay(seat.seat, meld_from_json(&seat.meld)?);
    }
    Ok(collect_until(iter_updates_multi(&hand, &table), deadline))
}

/// Get the git commit hash that this WASM module was built from
///
/// Returns the first 8 characters of the commit hash, or "unknown" if not available
#[wasm_bindgen]
pub fn get_build_commit() -> String {
    env!("BUILD_COMMIT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_enumerate_melds_json() {
        let out = enumerate_melds(r#"["9C","9H","9S"]"#, 1, 0, 0);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["melds"][0]["sets"][0].as_array().unwrap().len(), 3);
    }

    #[wasm_bindgen_test]
    fn test_enumerate_melds_rejects_empty_objective() {
        let out = enumerate_melds(r#"["9C"]"#, 0, 0, 0);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["success"], false);
    }

    #[wasm_bindgen_test]
    fn test_enumerate_melds_stops_at_deadline() {
        // nine wilds for three sets: far more melds than fit in a millisecond
        let wilds = serde_json::to_string(&vec!["*"; 9]).unwrap();
        let out = enumerate_melds(&wilds, 3, 0, 1);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["search_completed"], false);
        assert!(!value["melds"].as_array().unwrap().is_empty());
    }

    #[wasm_bindgen_test]
    fn test_enumerate_updates_json() {
        let table = r#"[{"seat": 2, "meld": {"runs": [["5D","*6D","7D","8D"]]}}]"#;
        let out = enumerate_updates(r#"["6D"]"#, table, 0);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["updates"].as_array().unwrap().len(), 1);
        assert_eq!(value["updates"][0]["freed"], 1);
    }

    #[wasm_bindgen_test]
    fn test_enumerate_updates_bad_card() {
        let out = enumerate_updates(r#"["6X"]"#, "[]", 0);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["success"], false);
    }
}
