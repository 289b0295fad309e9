use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::calendar::{CalendarEvent, month_grid};
use crate::config::Config;
use crate::datetime::format_day;
use crate::markdown::Note;
use crate::navigator::DayView;
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Header, filter, the visible tasks and the notes of the open task.
    #[tracing::instrument(skip_all)]
    pub fn print_day_view<W: Write>(
        &self,
        out: &mut W,
        view: &DayView,
        tasks: &[Task],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&view.header(), "1"))?;
        writeln!(out, "filter: {}", view.filter.label())?;
        writeln!(out)?;

        let visible = view.visible(tasks);
        if visible.is_empty() {
            writeln!(out, "No tasks.")?;
        } else {
            self.print_task_table(out, &visible, view.today)?;
        }

        if view.filter.allows_purge() && !visible.is_empty() {
            writeln!(out)?;
            writeln!(out, "Run `dayboard purge` to empty the trash.")?;
        }

        if let Some(task) = view
            .open_detail
            .and_then(|id| visible.iter().find(|t| t.id == id))
        {
            writeln!(out)?;
            self.print_notes(out, task)?;
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, fields(count = tasks.len()))]
    pub fn print_task_table<W: Write>(
        &self,
        out: &mut W,
        tasks: &[&Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Progress".to_string(),
            "Start".to_string(),
            "Completion".to_string(),
            "Title".to_string(),
            "State".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(&task.id.to_string(), "33");
            let progress = format!("{}%", task.progress_rate);
            let start = task.start_date.map(format_day).unwrap_or_default();

            let completion = task
                .scheduled_completion_date
                .map(format_day)
                .unwrap_or_default();
            let completion = match task.scheduled_completion_date {
                Some(date) if date < today && task.is_active() => self.paint(&completion, "31"),
                _ => completion,
            };

            let title = if task.completed_flg {
                self.paint(&task.title, "9")
            } else {
                task.title.clone()
            };

            rows.push(vec![
                id,
                progress,
                start,
                completion,
                title,
                task_state(task).to_string(),
            ]);
        }

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip_all, fields(id = task.id))]
    pub fn print_task_info<W: Write>(&self, out: &mut W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "state       {}", task_state(task))?;
        writeln!(out, "progress    {}%", task.progress_rate)?;
        writeln!(
            out,
            "start       {}",
            task.start_date.map(format_day).unwrap_or_default()
        )?;
        writeln!(
            out,
            "completion  {}",
            task.scheduled_completion_date
                .map(format_day)
                .unwrap_or_default()
        )?;
        writeln!(out, "images      {}", task.images.len())?;

        if !task.improvements.is_empty() {
            writeln!(out)?;
            self.print_notes(out, task)?;
        }
        Ok(())
    }

    /// Raw notes followed by the checklist with the ids `check` accepts.
    pub fn print_notes<W: Write>(&self, out: &mut W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&format!("notes for {}", task.id), "1"))?;
        if task.improvements.trim().is_empty() {
            writeln!(out, "(empty)")?;
            return Ok(());
        }
        for line in task.improvements.lines() {
            writeln!(out, "  {line}")?;
        }

        let note = Note::parse(&task.improvements);
        let checklist = note.checklist();
        if !checklist.is_empty() {
            writeln!(out)?;
            writeln!(out, "checklist")?;
            for item in checklist {
                let mark = if item.checked { "x" } else { " " };
                writeln!(out, "  [{mark}] {}", item.id)?;
            }
        }
        Ok(())
    }

    pub fn print_events<W: Write>(
        &self,
        out: &mut W,
        events: &[&CalendarEvent],
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Start".to_string(),
            "Last day".to_string(),
            "Title".to_string(),
        ];
        let rows = events
            .iter()
            .map(|event| {
                vec![
                    self.paint(&event.id, "33"),
                    format_day(event.start),
                    format_day(event.last_day()),
                    event.title.clone(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    /// Monday-first month grid. Days covered by an event carry a `*`;
    /// `today` is highlighted.
    pub fn print_month<W: Write>(
        &self,
        out: &mut W,
        focus: NaiveDate,
        events: &[&CalendarEvent],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let title = focus.format("%B %Y").to_string().to_uppercase();
        writeln!(out, "{}", self.paint(&title, "1"))?;
        writeln!(out, " Mo  Tu  We  Th  Fr  Sa  Su")?;

        for week in month_grid(focus) {
            let mut line = String::new();
            for day in week {
                if day.month() != focus.month() {
                    line.push_str("    ");
                    continue;
                }
                let marker = if events.iter().any(|e| e.covers(day)) {
                    "*"
                } else {
                    " "
                };
                let number = format!("{:>2}", day.day());
                let number = if day == today {
                    self.paint(&number, "7")
                } else {
                    number
                };
                line.push_str(&format!(" {number}{marker}"));
            }
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }

    pub fn notice<W: Write>(&self, out: &mut W, message: &str) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(message, "36"))?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn task_state(task: &Task) -> &'static str {
    if task.delete_flg {
        "trash"
    } else if task.completed_flg {
        "done"
    } else {
        "open"
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| format!("{header:width$}"))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
                format!("{cell}{}", " ".repeat(width.saturating_sub(visible_width)))
            })
            .collect();
        writeln!(writer, "{}", cells.join(" ").trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
