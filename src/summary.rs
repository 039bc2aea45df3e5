//! Checkout Summary
//!
//! Renders composed order totals as a terminal table: one row per line with
//! its unit price, applied discount and VAT split, followed by a summary
//! block of the order-level amounts.

use std::{fmt::Write, io};

use rusty_money::MoneyError;
use smallvec::{SmallVec, smallvec};
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::totals::{OrderLine, OrderTotals};

/// Errors that can occur when rendering a checkout summary.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Wrapper for money errors.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// IO error
    #[error("IO error")]
    IO,
}

/// Write a checkout summary for composed totals.
///
/// # Errors
///
/// Returns a [`SummaryError`] if the summary cannot be written.
pub fn write_summary(mut out: impl io::Write, totals: &OrderTotals<'_>) -> Result<(), SummaryError> {
    let mut builder = Builder::default();
    let mut color_ops: SmallVec<[(usize, usize, Color); 16]> = smallvec![];

    builder.push_record(["", "Item", "Qty", "Unit Price", "Line Total", "VAT", "Discount"]);

    for (idx, line) in totals.lines.iter().enumerate() {
        append_line_row(&mut builder, &mut color_ops, idx, line);
    }

    write_summary_table(&mut out, builder, color_ops)?;
    write_summary_block(&mut out, totals)?;

    Ok(())
}

fn append_line_row(
    builder: &mut Builder,
    color_ops: &mut SmallVec<[(usize, usize, Color); 16]>,
    idx: usize,
    line: &OrderLine<'_>,
) {
    let discount_cell = line.discount.as_ref().map_or(String::new(), |snapshot| {
        format!("(-{}%) {}", snapshot.percent_points, snapshot.name)
    });

    builder.push_record([
        format!("#{:<3}", idx + 1),
        line.product_name.clone(),
        line.quantity.to_string(),
        format!("{}", line.unit_price),
        format!("{}", line.line_total),
        format!("{}", line.vat.vat),
        discount_cell.clone(),
    ]);

    // Header is row 0.
    let row = idx + 1;

    color_ops.push((row, 5, color_dark_grey()));

    if !discount_cell.is_empty() {
        color_ops.push((row, 6, Color::FG_GREEN));
    }
}

fn write_summary_table(
    out: &mut impl io::Write,
    builder: Builder,
    color_ops: SmallVec<[(usize, usize, Color); 16]>,
) -> Result<(), SummaryError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(2..6), Alignment::right());

    for (row, col, color) in color_ops {
        table.modify((row, col), color);
    }

    let table_str = colorize_borders(&table.to_string());

    writeln!(out, "\n{table_str}").map_err(|_err| SummaryError::IO)
}

fn write_summary_block(
    out: &mut impl io::Write,
    totals: &OrderTotals<'_>,
) -> Result<(), SummaryError> {
    let subtotal_label = " Subtotal:";
    let vat_label = " VAT:";
    let shipping_label = " Shipping:";
    let savings_label = " Savings:";
    let total_label = " \x1b[1mTotal:\x1b[0m";

    let subtotal_val = format!("{}  ", totals.subtotal);
    let vat_val = format!("{}  ", totals.total_vat);
    let shipping_val = format!("{}  ", totals.shipping);
    let savings_val = format!("-{}  ", totals.total_discount);
    let total_val = format!("{}  ", totals.grand_total);

    let label_width = [
        subtotal_label,
        vat_label,
        shipping_label,
        savings_label,
        total_label,
    ]
    .iter()
    .map(|label| visible_width(label))
    .max()
    .unwrap_or(0);

    let value_width = [&subtotal_val, &vat_val, &shipping_val, &savings_val, &total_val]
        .iter()
        .map(|value| value.len())
        .max()
        .unwrap_or(0);

    write_summary_line(out, subtotal_label, &subtotal_val, label_width, value_width)?;
    write_summary_line(out, vat_label, &vat_val, label_width, value_width)?;
    write_summary_line(out, shipping_label, &shipping_val, label_width, value_width)?;
    write_summary_line(out, savings_label, &savings_val, label_width, value_width)?;

    write_summary_line(
        out,
        total_label,
        &format!("\x1b[1m{total_val}\x1b[0m"),
        label_width,
        value_width,
    )?;

    writeln!(out).map_err(|_err| SummaryError::IO)
}

/// Wraps runs of UTF-8 box-drawing characters in ANSI dark-grey escape codes.
///
/// Box-drawing characters occupy the Unicode range U+2500..U+257F. This function
/// scans each character, grouping consecutive border characters and emitting a
/// single grey escape sequence around each run, leaving cell content untouched.
fn colorize_borders(table: &str) -> String {
    let mut out = String::with_capacity(table.len() + 256);
    let mut in_run = false;

    for ch in table.chars() {
        let box_char = ('\u{2500}'..='\u{257F}').contains(&ch);

        if box_char && !in_run {
            _ = out.write_str("\x1b[90m");
            in_run = true;
        } else if !box_char && in_run {
            _ = out.write_str("\x1b[0m");
            in_run = false;
        }

        out.push(ch);
    }

    if in_run {
        _ = out.write_str("\x1b[0m");
    }

    out
}

/// Returns the visible (non-ANSI) width of a string.
fn visible_width(s: &str) -> usize {
    let mut width = 0usize;
    let mut in_escape = false;

    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            width += 1;
        }
    }

    width
}

/// Writes a summary line with a right-aligned label and a fixed-width value column.
fn write_summary_line(
    out: &mut impl io::Write,
    label: &str,
    value: &str,
    label_col_width: usize,
    value_col_width: usize,
) -> Result<(), SummaryError> {
    let label_vis = visible_width(label);
    let value_vis = visible_width(value);

    // 2 chars of spacing between label and value column.
    let label_pad = label_col_width.saturating_sub(label_vis);
    let value_pad = value_col_width.saturating_sub(value_vis);

    writeln!(
        out,
        "{:>label_pad$}{label}  {value_pad}{value}",
        "",
        value_pad = " ".repeat(value_pad)
    )
    .map_err(|_err| SummaryError::IO)
}

/// ANSI dark grey foreground.
fn color_dark_grey() -> Color {
    Color::new("\x1b[90m", "\x1b[0m")
}
