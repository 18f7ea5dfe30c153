//! Table printing abstraction for the comparison outputs: either
//! fixed-width plain text for reading in the terminal, or LaTeX
//! `tabular` markup for pasting into the paper.

//! Only the LaTeX mode escapes anything in the fields, and only the
//! handful of specials that occur in config and component names;
//! values that can print newlines would still make rows ambiguous.

use std::{fmt::Display, io::Write};

use anyhow::{anyhow, bail, Result};
use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    Plain,
    Latex,
}

fn latex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '_' | '&' | '%' | '#' | '$' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Capable of streaming, which requires defining the column widths
/// beforehand. If a value is wider than the defined column width for
/// that value, a single space is still printed between the value and
/// the next. The last column does not need a width, and no padding is
/// printed.
pub struct OutputTable {
    widths: Vec<usize>,
    titles: Vec<String>,
    padding: String,
    pub mode: TableMode,
}

impl OutputTable {
    /// The length of `widths` must be one less than that of `titles`
    /// (the last column does not need a width).
    pub fn new<S: Display>(widths: &[usize], titles: &[S], mode: TableMode) -> Self {
        let titles = titles.iter().map(|title| title.to_string()).collect();
        let max_width = widths.iter().max().copied().unwrap_or(0);
        let padding = " ".repeat(max_width);
        Self {
            widths: widths.to_owned(),
            titles,
            padding,
            mode,
        }
    }

    /// In LaTeX mode, opens the `tabular` environment (left-aligned
    /// columns); nothing to do in plain mode.
    pub fn write_preamble(&self, out: &mut impl Write) -> Result<()> {
        if self.mode == TableMode::Latex {
            let column_spec = "l".repeat(self.titles.len());
            writeln!(out, "\\begin{{tabular}}{{{column_spec}}}")?;
            writeln!(out, "\\toprule")?;
        }
        Ok(())
    }

    pub fn write_postamble(&self, out: &mut impl Write) -> Result<()> {
        if self.mode == TableMode::Latex {
            writeln!(out, "\\bottomrule")?;
            writeln!(out, "\\end{{tabular}}")?;
        }
        Ok(())
    }

    fn write_row<V: Display>(&self, row: &[V], out: &mut impl Write) -> Result<()> {
        let lens = (self.widths.len(), row.len());
        let (l1, l2) = lens;
        if l1
            != l2
                .checked_sub(1)
                .ok_or_else(|| anyhow!("need at least 1 column"))?
        {
            bail!("widths.len != data.len - 1: {lens:?}")
        }

        match self.mode {
            TableMode::Latex => {
                let cells = row.iter().map(|v| latex_escape(&v.to_string())).join(" & ");
                writeln!(out, "{cells} \\\\")?;
            }
            TableMode::Plain => {
                for either_or_both in self.widths.iter().zip_longest(row) {
                    let val = either_or_both
                        .as_ref()
                        .right()
                        .expect("value there because row len checked above");
                    let s = val.to_string();
                    out.write_all(s.as_bytes())?;

                    if let Some(width) = either_or_both.left() {
                        if *width > s.len() {
                            let needed_padding = width - s.len();
                            out.write_all(self.padding[0..needed_padding].as_bytes())?;
                        } else {
                            // write out at least 1 space anyway
                            out.write_all(b" ")?;
                        }
                    }
                }
                out.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    pub fn write_title_row(&self, out: &mut impl Write) -> Result<()> {
        self.write_row(&self.titles, out)?;
        if self.mode == TableMode::Latex {
            writeln!(out, "\\midrule")?;
        }
        Ok(())
    }

    pub fn write_data_row<V: Display>(&self, data: &[V], out: &mut impl Write) -> Result<()> {
        self.write_row(data, out)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    fn render(mode: TableMode) -> Result<String> {
        let table = OutputTable::new(&[8, 6], &["config", "x", "y"], mode);
        let mut out = Vec::new();
        table.write_preamble(&mut out)?;
        table.write_title_row(&mut out)?;
        table.write_data_row(&["roibin_sz", "1.5", "2"], &mut out)?;
        table.write_postamble(&mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn t_plain() -> Result<()> {
        let out = render(TableMode::Plain)?;
        assert_eq!(out, "config  x     y\nroibin_sz 1.5   2\n");
        Ok(())
    }

    #[test]
    fn t_latex() -> Result<()> {
        let out = render(TableMode::Latex)?;
        assert_eq!(
            out,
            "\\begin{tabular}{lll}\n\
             \\toprule\n\
             config & x & y \\\\\n\
             \\midrule\n\
             roibin\\_sz & 1.5 & 2 \\\\\n\
             \\bottomrule\n\
             \\end{tabular}\n"
        );
        Ok(())
    }

    #[test]
    fn t_row_length_checked() {
        let table = OutputTable::new(&[8], &["a", "b"], TableMode::Plain);
        let mut out = Vec::new();
        assert!(table.write_data_row(&["only one"], &mut out).is_err());
    }
}
