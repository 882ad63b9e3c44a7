//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

use super::app::DebuggerApp;
use crate::cpu::Bus;
use crate::isa::RegisterCode;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(frame.area());

    // Left side: code, datapath and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(5),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_buses(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: registers, memory, console and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(13),
            Constraint::Min(6),
            Constraint::Length(5),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_registers(frame, right_chunks[0], app);
    draw_memory(frame, right_chunks[1], app);
    draw_console(frame, right_chunks[2], app);
    draw_help(frame, right_chunks[3]);
}

fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:#06x}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(list, area);
}

/// What each bus carried during the last cycle.
fn draw_buses(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let content: Vec<Line> = Bus::ALL
        .iter()
        .map(|&bus| {
            let route = match app.cpu.fabric.selection(bus) {
                Some(plan) => Span::styled(
                    format!("{} → {}", plan.source, plan.destination),
                    Style::default().fg(Color::White),
                ),
                None => Span::styled("idle", Style::default().fg(Color::DarkGray)),
            };
            Line::from(vec![Span::raw(format!("{:<10}", bus.to_string())), route])
        })
        .collect();

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .title(format!(" Buses ({} transfers) ", app.cpu.fabric.transfers()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)),
    );

    frame.render_widget(paragraph, area);
}

fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let cpu = &app.cpu;
    let flags = cpu.flags();

    let mut content = vec![
        Line::from(vec![
            Span::raw("PC "),
            Span::styled(format!("{:#010x}", cpu.pc()), Style::default().fg(Color::Yellow)),
            Span::raw("  MAR "),
            Span::raw(format!("{:#010x}", cpu.register(RegisterCode::Mar))),
            Span::raw("  MDR "),
            Span::raw(format!("{:#010x}", cpu.register(RegisterCode::Mdr))),
        ]),
        Line::from(vec![
            Span::raw("IRA "),
            Span::raw(format!("{:#010x}", cpu.register(RegisterCode::Ira))),
            Span::raw("  IRB "),
            Span::raw(format!("{:#010x}", cpu.register(RegisterCode::Irb))),
        ]),
        Line::from(vec![
            Span::raw("Flags "),
            flag_span("Z", flags.zero),
            flag_span("N", flags.negative),
            flag_span("O", flags.overflow),
            flag_span("C", flags.carry),
            Span::raw(format!("  ALU {}", cpu.datapath.alu.operation())),
        ]),
        Line::from(vec![
            Span::raw("Phase "),
            Span::styled(cpu.phase().to_string(), Style::default().fg(Color::Cyan)),
            Span::raw("  Cycles "),
            Span::styled(cpu.cycles.to_string(), Style::default().fg(Color::Cyan)),
            Span::raw("  State "),
            Span::styled(
                format!("{:?}", cpu.state),
                if cpu.is_running() {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red)
                },
            ),
        ]),
    ];

    let gp = cpu.datapath.regs.gp_values();
    for pair in RegisterCode::GP.chunks(2).zip(gp.chunks(2)) {
        let spans: Vec<Span> = pair
            .0
            .iter()
            .zip(pair.1)
            .map(|(code, value)| {
                let style = if *value == 0 {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default().fg(Color::White)
                };
                Span::styled(format!("{:<5}{:#010x}  ", code.name(), value), style)
            })
            .collect();
        content.push(Line::from(spans));
    }

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    );

    frame.render_widget(paragraph, area);
}

fn flag_span(name: &'static str, set: bool) -> Span<'static> {
    if set {
        Span::styled(format!("{} ", name), Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
    } else {
        Span::styled(format!("{} ", name.to_lowercase()), Style::default().fg(Color::DarkGray))
    }
}

/// RAM, four words per row.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let layout = app.cpu.layout();
    let pc = app.cpu.pc();

    let items: Vec<ListItem> = (0..visible_rows)
        .filter_map(|row| {
            let base = layout
                .ram_start
                .checked_add((app.mem_scroll + row * 4) as u32)?;
            if base > layout.ram_end {
                return None;
            }
            let mut spans = vec![Span::raw(format!("{:#06x}: ", base))];
            for addr in base..=base.saturating_add(3).min(layout.ram_end) {
                let value = app.cpu.read_memory(addr).unwrap_or(0);
                let style = if addr == pc || addr == pc.wrapping_add(1) {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else if value != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(format!("{:08x} ", value), style));
            }
            Some(ListItem::new(Line::from(spans)))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)),
    );

    frame.render_widget(list, area);
}

fn draw_console(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let text = app.console.text();
    // Keep the tail in view
    let lines = text.lines().count() as u16;
    let scroll = lines.saturating_sub(area.height.saturating_sub(2));

    let console = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(Block::default().title(" Console ").borders(Borders::ALL));

    frame.render_widget(console, area);
}

fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default().title(" Status ").borders(Borders::ALL));

    frame.render_widget(status, area);
}

fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Pulse  i: Step  r: Run  p: Pause  b: Breakpoint"),
        Line::from("x: Reset  ↑↓: Scroll memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default().title(" Help ").borders(Borders::ALL));

    frame.render_widget(help, area);
}
