//! Single-screen rendering: header, tap deck, quests, log.

use std::cell::RefCell;
use std::rc::Rc;

use ratzilla::ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratzilla::ratatui::style::{Color, Modifier, Style};
use ratzilla::ratatui::text::{Line, Span};
use ratzilla::ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratzilla::ratatui::Frame;

use crate::app::App;
use crate::chests;
use crate::input::{ClickState, ACTION_CHEST_BASE, ACTION_TAP, ACTION_TASK_BASE};
use crate::rank::resolve_rank;
use crate::tasks;

/// Ship art for the tap deck, 3 lines.
const SHIP_ART: &[&str] = &["    |\\   ", "   /| \\  ", "  (_____)"];

const CHEST_GLYPH: &str = "▣宝";

pub fn render(app: &App, f: &mut Frame, area: Rect, click_state: &Rc<RefCell<ClickState>>) {
    click_state.borrow_mut().clear_targets();

    if app.blocked {
        render_blocked(f, area);
        return;
    }

    // Log panel on the right when wide enough.
    let (main_area, log_area) = if area.width >= 80 {
        let h = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);
        (h[0], Some(h[1]))
    } else {
        (area, None)
    };

    let task_rows = tasks::catalog().len() as u16 + 2;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),        // header
            Constraint::Min(8),           // tap deck
            Constraint::Length(3),        // energy
            Constraint::Length(task_rows),
        ])
        .split(main_area);

    render_header(app, f, chunks[0]);
    render_deck(app, f, chunks[1], click_state);
    render_energy(app, f, chunks[2]);
    render_quests(app, f, chunks[3], click_state);

    if let Some(log_area) = log_area {
        render_log(app, f, log_area);
    }
}

fn render_blocked(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " ⚓ 別のタブでプレイ中です",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            " このセッションは停止しました。他のタブを閉じて再読み込みしてください。",
            Style::default().fg(Color::White),
        )),
    ];
    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Sea Clicker "),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(widget, area);
}

fn render_header(app: &App, f: &mut Frame, area: Rect) {
    let p = app.state.profile();
    let rank = resolve_rank(p.balance);
    let name = if p.first_name.is_empty() { "Guest" } else { &p.first_name };

    let line = Line::from(vec![
        Span::styled(
            format!(" 🏴‍☠️ {name} "),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("[{}] ", rank.name),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("💰 {:.0} ", p.balance.floor()),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("👥 {}", p.referrals.len()),
            Style::default().fg(Color::Green),
        ),
    ]);

    let widget = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Sea Clicker "),
    );
    f.render_widget(widget, area);
}

fn render_deck(app: &App, f: &mut Frame, area: Rect, click_state: &Rc<RefCell<ClickState>>) {
    let p = app.state.profile();
    let gain = app.state.tap_gain();
    let now = crate::time::now_ms();

    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(Span::styled(
        format!(" [C]タップ +{gain:.0} ゴールド"),
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )));
    for row in SHIP_ART {
        lines.push(Line::from(Span::styled(
            *row,
            Style::default().fg(Color::White),
        )));
    }
    lines.push(Line::from(Span::styled(
        format!(" {} ({})", p.selected_ship, p.location),
        Style::default().fg(Color::DarkGray),
    )));

    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue))
            .title(" 甲板 "),
    );
    f.render_widget(widget, area);

    // Chest overlays, drawn on top of the deck at their fixed positions.
    for chest in &app.chests {
        let x = area.x + 1 + chest.x.min(area.width.saturating_sub(6));
        let y = area.y + 1 + chest.y.min(area.height.saturating_sub(3));
        if x >= area.x + area.width || y >= area.y + area.height {
            continue;
        }
        let open = chests::is_collectible(chest, now);
        let (glyph, style) = if open {
            (
                CHEST_GLYPH,
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )
        } else {
            ("▢..", Style::default().fg(Color::DarkGray))
        };
        let rect = Rect::new(x, y, 4.min(area.x + area.width - x), 1);
        f.render_widget(Paragraph::new(Span::styled(glyph, style)), rect);
    }

    // Chests register before the deck target so they win the hit test.
    let mut cs = click_state.borrow_mut();
    for (i, chest) in app.chests.iter().enumerate() {
        let x = area.x + 1 + chest.x.min(area.width.saturating_sub(6));
        let y = area.y + 1 + chest.y.min(area.height.saturating_sub(3));
        if x < area.x + area.width && y < area.y + area.height {
            let w = 4.min(area.x + area.width - x);
            cs.add_target(Rect::new(x, y, w, 1), ACTION_CHEST_BASE + i as u16);
        }
    }
    cs.add_target(area, ACTION_TAP);
}

fn render_energy(app: &App, f: &mut Frame, area: Rect) {
    let p = app.state.profile();
    let frac = if p.max_energy > 0.0 {
        (p.energy / p.max_energy).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let bar_w = area.width.saturating_sub(18) as usize;
    let filled = ((frac * bar_w as f64).round() as usize).min(bar_w);
    let bar: String = "█".repeat(filled) + &"░".repeat(bar_w - filled);
    let color = if frac < 0.2 { Color::Red } else { Color::Green };

    let line = Line::from(vec![
        Span::styled(" ⚡ ", Style::default().fg(color)),
        Span::styled(bar, Style::default().fg(color)),
        Span::styled(
            format!(" {:.0}/{:.0}", p.energy.floor(), p.max_energy),
            Style::default().fg(Color::White),
        ),
    ]);
    let widget = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT)
            .border_style(Style::default().fg(Color::Green)),
    );
    f.render_widget(widget, area);
}

fn render_quests(app: &App, f: &mut Frame, area: Rect, click_state: &Rc<RefCell<ClickState>>) {
    let p = app.state.profile();
    let mut lines: Vec<Line> = Vec::new();
    let mut cs = click_state.borrow_mut();

    for (i, task) in p.tasks.iter().enumerate() {
        let key = i + 1;
        let (marker, style) = if task.completed {
            ("✅", Style::default().fg(Color::Green))
        } else {
            ("▸ ", Style::default().fg(Color::White))
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!(" [{key}] "),
                if task.completed {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                },
            ),
            Span::styled(format!("{marker} {} ", task.title), style),
            Span::styled(
                format!("+{:.0}", task.points),
                Style::default().fg(Color::Cyan),
            ),
        ]));
        if !task.completed {
            cs.add_row_target(area, area.y + 1 + i as u16, ACTION_TASK_BASE + i as u16);
        }
    }

    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta))
            .title(" クエスト [1-3] "),
    );
    f.render_widget(widget, area);
}

fn render_log(app: &App, f: &mut Frame, area: Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = app
        .log
        .iter()
        .rev()
        .take(visible)
        .enumerate()
        .map(|(i, entry)| {
            let style = if entry.is_important {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if i < 3 {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Line::from(Span::styled(entry.text.as_str(), style))
        })
        .collect();

    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue))
                .title(" Log "),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(widget, area);
}
