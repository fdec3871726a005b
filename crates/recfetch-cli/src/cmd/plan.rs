//! Plan subcommand - show the monthly windows a fetch would list

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use comfy_table::{Cell, CellAlignment, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use recfetch_recordings::DateWindow;
use recfetch_recordings::window;

use super::parse_date;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// First day (YYYY-MM-DD, inclusive)
    #[arg(long, value_parser = parse_date)]
    pub from: NaiveDate,

    /// Last day (YYYY-MM-DD, inclusive)
    #[arg(long, value_parser = parse_date)]
    pub to: NaiveDate,
}

fn format_plan(windows: &[DateWindow]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("#").fg(Color::Cyan),
            Cell::new("From").fg(Color::Cyan),
            Cell::new("To").fg(Color::Cyan),
            Cell::new("Days").fg(Color::Cyan),
        ]);

    for (i, w) in windows.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(w.start),
            Cell::new(w.end),
            Cell::new(w.days()).set_alignment(CellAlignment::Right),
        ]);
    }

    table.to_string()
}

pub fn run(args: PlanArgs) -> Result<()> {
    let windows = window::plan(args.from, args.to)?;
    println!("{}", format_plan(&windows));
    log::info!(
        "{} window(s), {} day(s)",
        windows.len(),
        windows.iter().map(DateWindow::days).sum::<i64>()
    );
    Ok(())
}
