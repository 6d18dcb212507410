use std::io::Write;
use clap::ValueEnum;
use serde::Serialize;
use crate::lookup::{LookupState, Phase};
use crate::postal::model::PostOffice;

const HEADERS: [&str; 4] = ["Post Office Name", "Pincode", "District", "State"];
const LOADING_LINE: &str = "Loading...";

/// One output row
#[derive(Debug, Serialize)]
pub struct Record<'a> {
    #[serde(rename = "Post Office Name")]
    name: &'a str,
    #[serde(rename = "Pincode")]
    pincode: &'a str,
    #[serde(rename = "District")]
    district: &'a str,
    #[serde(rename = "State")]
    state: &'a str,
}

impl<'a> Record<'a> {
    pub fn from_post_office(office: &'a PostOffice) -> Self {
        Self {
            name: office.name(),
            pincode: office.pincode(),
            district: office.district(),
            state: office.state(),
        }
    }

    fn columns(&self) -> [&'a str; 4] {
        [self.name, self.pincode, self.district, self.state]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// aligned plain-text table
    #[default]
    Table,
    Csv,
    Json,
}

/// write the visible part of a session
///
/// Status lines (loading, the current message) go to `status`, rows go to `out`.
pub fn render_view(
    state: &LookupState,
    format: OutputFormat,
    mut out: impl Write,
    mut status: impl Write,
) -> color_eyre::Result<()> {
    if let Phase::Loading = state.phase() {
        writeln!(status, "{}", LOADING_LINE)?;
    }
    if let Some(message) = state.error_message() {
        writeln!(status, "{}", message)?;
    }
    if state.visible_len() > 0 {
        let records = state.visible_results()
            .map(Record::from_post_office)
            .collect::<Vec<_>>();
        write_records(&records, format, &mut out)?;
        if format == OutputFormat::Table {
            writeln!(status, "{}", summary(state))?;
        }
    }
    out.flush()?;
    Ok(())
}

/// `2 of 4 post offices for [110001] matching "jan"`
fn summary(state: &LookupState) -> String {
    let mut line = format!(
        "{} of {} post offices for [{}]",
        state.visible_len(),
        state.all_results().len(),
        state.loaded_code(),
    );
    if !state.filter_text().is_empty() {
        line.push_str(&format!(" matching \"{}\"", state.filter_text()));
    }
    line
}

pub fn write_records(records: &[Record<'_>], format: OutputFormat, mut out: impl Write) -> color_eyre::Result<()> {
    match format {
        OutputFormat::Table => write_table(records, &mut out)?,
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(&mut out);
            for record in records {
                wtr.serialize(record)?;
            }
            wtr.flush()?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, records)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn write_table(records: &[Record<'_>], out: &mut impl Write) -> std::io::Result<()> {
    let mut widths = HEADERS.map(|h| h.chars().count());
    for record in records {
        for (width, column) in widths.iter_mut().zip(record.columns()) {
            *width = (*width).max(column.chars().count());
        }
    }

    write_row(out, &widths, HEADERS)?;
    let rule = widths.iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-");
    writeln!(out, "{}", rule)?;
    for record in records {
        write_row(out, &widths, record.columns())?;
    }
    Ok(())
}

fn write_row(out: &mut impl Write, widths: &[usize; 4], columns: [&str; 4]) -> std::io::Result<()> {
    let line = columns.iter()
        .zip(widths)
        .map(|(column, width)| format!("{:<width$}", column, width = *width))
        .collect::<Vec<_>>()
        .join(" | ");
    writeln!(out, "{}", line.trim_end())
}
