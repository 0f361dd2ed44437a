pub mod configuration;
pub mod fleet_runner;
pub mod in_memory_universe;
pub mod market_tracker;
pub mod reqwest_helpers;
pub mod ship;
pub mod st_client;
pub mod trading_run;

use chrono::TimeDelta;
use itertools::Itertools;
use std::fmt::Display;

#[cfg(test)]
pub mod test_objects;

pub fn format_time_delta_hh_mm_ss(delta: TimeDelta) -> String {
    let total_seconds = delta.num_seconds();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

// Format any collection whose items implement Display
pub fn format_and_sort_collection<'a, T, I>(collection: I) -> String
where
    T: Display + 'a,
    I: IntoIterator<Item = &'a T>,
{
    collection
        .into_iter()
        .map(|item| item.to_string())
        .sorted()
        .join(", ")
}
