use std::fmt::Display;

use anyhow::Result;
use chrono::Local;
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use now::DateTimeNow;

use crate::{
    store::{activity_store::ActivityStore, entities::ActivityRecord},
    utils::time::{format_millis, local_from_millis, next_day_start, to_millis},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct RangeArgs {
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\", \"12:00 16/03/2025\". Defaults to the start of today"
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range. Same formats as --start. Defaults to now"
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        long = "days",
        default_value_t = false,
        help = "Take inputs as whole days. For example if start and end are both 15/03/2025 this option extracts the whole day"
    )]
    treat_as_days: bool,
}

/// Resolves the range arguments into the epoch-millisecond bounds the store
/// queries take, with sensible defaults for omitted ends.
fn parse_range(
    RangeArgs {
        start_date,
        end_date,
        date_style,
        treat_as_days,
    }: RangeArgs,
) -> Result<(i64, i64)> {
    let now = Local::now();
    let dialect: chrono_english::Dialect = date_style.into();

    let mut start = match start_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v.with_timezone(&Local),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate start date {e}"),
                )
                .into());
        }
        None => now.beginning_of_day(),
    };
    let mut end = match end_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v.with_timezone(&Local),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate end date {e}"),
                )
                .into());
        }
        None => now,
    };

    if treat_as_days {
        start = start.beginning_of_day();
        end = next_day_start(end);
    }

    Ok((to_millis(start), to_millis(end)))
}

fn print_record(record: &ActivityRecord) {
    println!(
        "{}\t{}\t{}\t{}\t{}",
        local_from_millis(record.timestamp).format("%x %H:%M:%S"),
        format_millis(record.duration),
        record.category,
        record.app_name,
        record.window_title
    );
}

pub async fn process_recent_command(store: &impl ActivityStore, limit: usize) -> Result<()> {
    for record in store.recent(limit).await? {
        print_record(&record);
    }
    Ok(())
}

pub async fn process_timeline_command(store: &impl ActivityStore, range: RangeArgs) -> Result<()> {
    let (start, end) = parse_range(range)?;
    for record in store.by_time_range(start, end).await? {
        print_record(&record);
    }
    Ok(())
}

pub async fn process_summary_command(store: &impl ActivityStore, range: RangeArgs) -> Result<()> {
    let (start, end) = parse_range(range)?;
    for summary in store.summary(start, end).await? {
        println!(
            "{}\t{}\t{}",
            format_millis(summary.total_time),
            summary.count,
            summary.app_name
        );
    }
    Ok(())
}
