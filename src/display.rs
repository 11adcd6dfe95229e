use crate::control::Mode;
use crate::engine::StatusFlags;
use crate::surface::{Field, MemoryView, Screen};
use crate::viewport::Highlight;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use std::io;
use tui::backend::{Backend, CrosstermBackend};
use tui::layout::{Constraint, Direction, Layout, Rect};
use tui::style::{Color, Modifier, Style};
use tui::text::{Span, Spans};
use tui::widgets::{Block, Borders, Clear, Paragraph};
use tui::{Frame, Terminal};

/// Display draws a [`Screen`] snapshot. It should abstract the implementation
/// details, so a variety of kinds of screen would work.
pub trait Display {
    fn draw(&mut self, screen: &Screen) -> Result<(), io::Error>;
}

/// full-screen monitor in a terminal, rendered using TUI and Crossterm
pub struct TermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    settings_path: String,
}

impl TermDisplay {
    pub fn new(settings_path: String) -> Result<TermDisplay, io::Error> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.hide_cursor()?;
        terminal.clear()?;
        Ok(TermDisplay {
            terminal,
            settings_path,
        })
    }
}

impl Display for TermDisplay {
    fn draw(&mut self, screen: &Screen) -> Result<(), io::Error> {
        let settings_path = &self.settings_path;
        self.terminal.draw(|f| draw_frame(f, screen, settings_path))?;
        Ok(())
    }
}

impl Drop for TermDisplay {
    // give the terminal back even when leaving on an error
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen, DisableMouseCapture);
        let _ = self.terminal.show_cursor();
    }
}

/// useful for testing non-display routines
#[derive(Default)]
pub struct DummyDisplay {
    pub frames: usize,
}

impl DummyDisplay {
    pub fn new() -> DummyDisplay {
        DummyDisplay::default()
    }
}

impl Display for DummyDisplay {
    fn draw(&mut self, _screen: &Screen) -> Result<(), io::Error> {
        self.frames += 1;
        Ok(())
    }
}

fn label() -> Style {
    Style::default().fg(Color::Gray)
}

fn mode_style(mode: Mode) -> Style {
    match mode {
        Mode::Running => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        Mode::Stepping => Style::default().fg(Color::Yellow),
        Mode::Halted => Style::default().fg(Color::Red),
    }
}

/// value shown for a field: the edit buffer when it is being typed into
fn field_span(screen: &Screen, field: Field, value: String) -> Span<'static> {
    if screen.focus != field {
        return Span::styled(value, Style::default().fg(Color::White));
    }
    match &screen.edit {
        Some(buf) => Span::styled(
            format!("{}_", buf),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ),
        None => Span::styled(value, Style::default().add_modifier(Modifier::REVERSED)),
    }
}

fn flag_spans(flags: &StatusFlags) -> Vec<Span<'static>> {
    [
        ('N', flags.n),
        ('V', flags.v),
        ('-', false),
        ('B', flags.b),
        ('D', flags.d),
        ('I', flags.i),
        ('Z', flags.z),
        ('C', flags.c),
    ]
    .iter()
    .map(|&(name, set)| {
        let style = if set {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Span::styled(name.to_string(), style)
    })
    .collect()
}

fn cpu_lines(screen: &Screen) -> Vec<Spans<'static>> {
    let regs = &screen.cpu.regs;
    let mut lines = vec![
        Spans::from(vec![
            Span::styled("Mode      ", label()),
            Span::styled(screen.mode.label(), mode_style(screen.mode)),
        ]),
        Spans::from(vec![
            Span::styled("Interval  ", label()),
            field_span(screen, Field::Interval, format!("{} ms", screen.interval_ms)),
        ]),
        Spans::from(vec![
            Span::styled("Cycles    ", label()),
            Span::raw(screen.steps.to_string()),
        ]),
        Spans::from(vec![
            Span::styled("Cycle     ", label()),
            Span::raw(screen.cpu.cycle_name),
        ]),
        Spans::from(""),
        Spans::from(vec![
            Span::styled("PC ", label()),
            Span::styled(
                format!("{:04X}", regs.pc),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  Instr ", label()),
            Span::styled(
                format!("{:04X}", screen.cpu.instr_ptr),
                Style::default().fg(Color::Yellow),
            ),
        ]),
        Spans::from(vec![
            Span::styled("A ", label()),
            Span::raw(format!("{:02X}  ", regs.a)),
            Span::styled("X ", label()),
            Span::raw(format!("{:02X}  ", regs.x)),
            Span::styled("Y ", label()),
            Span::raw(format!("{:02X}  ", regs.y)),
            Span::styled("SP ", label()),
            Span::raw(format!("{:02X}", regs.sp)),
        ]),
    ];
    let mut flags = vec![Span::styled("Flags ", label())];
    flags.extend(flag_spans(&regs.flags));
    lines.push(Spans::from(flags));
    lines.push(Spans::from(""));
    for (v, value) in screen.vectors {
        lines.push(Spans::from(vec![
            Span::styled(format!("{:<14}", v.label()), label()),
            field_span(screen, Field::Vector(v), format!("{:04X}", value)),
        ]));
    }
    lines
}

fn memory_lines(screen: &Screen, mem: &MemoryView) -> Vec<Spans<'static>> {
    let mut header = vec![Span::styled("      ", label())];
    header.extend((0..mem.cols).map(|c| Span::styled(format!(" {:02X}", c), label())));
    let mut lines = vec![Spans::from(header)];

    for (r, row) in mem.cells.chunks(mem.cols).enumerate() {
        let mut spans = vec![Span::styled(
            format!("{:04X}: ", row[0].addr),
            Style::default().fg(Color::DarkGray),
        )];
        for (c, cell) in row.iter().enumerate() {
            spans.push(Span::raw(" "));
            let is_cursor = screen.focus == Field::Memory && screen.cursor == (r, c);
            if is_cursor {
                if let Some(buf) = &screen.edit {
                    spans.push(Span::styled(
                        format!("{:<2}", buf),
                        Style::default().fg(Color::Black).bg(Color::Yellow),
                    ));
                    continue;
                }
            }
            let mut style = match cell.highlight {
                Highlight::ProgramCounter => Style::default().fg(Color::Black).bg(Color::Green),
                Highlight::ActiveInstruction => {
                    Style::default().fg(Color::Black).bg(Color::Yellow)
                }
                Highlight::None if cell.value != 0 => Style::default().fg(Color::White),
                Highlight::None => Style::default().fg(Color::DarkGray),
            };
            if is_cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(format!("{:02X}", cell.value), style));
        }
        lines.push(Spans::from(spans));
    }
    lines
}

fn geometry_lines(screen: &Screen, mem: Option<&MemoryView>) -> Spans<'static> {
    let (rows, cols, base) = mem.map_or((0, 0, 0), |m| (m.rows, m.cols, m.base));
    Spans::from(vec![
        Span::styled("Rows ", label()),
        field_span(screen, Field::Rows, rows.to_string()),
        Span::styled("  Cols ", label()),
        field_span(screen, Field::Cols, cols.to_string()),
        Span::styled("  Base ", label()),
        field_span(screen, Field::Base, format!("{:04X}", base)),
    ])
}

fn help_lines() -> Vec<Spans<'static>> {
    let heading = Style::default().fg(Color::Yellow);
    vec![
        Spans::from(Span::styled("── Execution ──", heading)),
        Spans::from("s/Space  Start / Pause"),
        Spans::from("p  Pause | n  Step"),
        Spans::from("r  Reset CPU: registers from reset vector"),
        Spans::from(""),
        Spans::from(Span::styled("── Memory ──", heading)),
        Spans::from("c  Clear Memory | d  Load Default"),
        Spans::from("t  Load Test (64K image, reset 0400)"),
        Spans::from("PgUp/PgDn, wheel  Scroll a page"),
        Spans::from(""),
        Spans::from(Span::styled("── Fields ──", heading)),
        Spans::from("Tab/Shift+Tab  Focus | ←↑↓→  Cell"),
        Spans::from("Enter  Edit/commit | Esc  Cancel"),
        Spans::from("Editing memory or a vector pauses"),
        Spans::from(""),
        Spans::from(Span::styled("── Panels ──", heading)),
        Spans::from("m  Memory | g  Settings | h  Help"),
        Spans::from("q/Esc  Quit"),
    ]
}

fn settings_lines(screen: &Screen, settings_path: &str) -> Vec<Spans<'static>> {
    let fps = screen
        .fps
        .map_or_else(|| "-".to_string(), |fps| format!("{:.1}", fps));
    vec![
        Spans::from(vec![Span::styled("Refresh  ", label()), Span::raw(format!("{} fps", fps))]),
        Spans::from(vec![Span::styled("Image    ", label()), Span::raw(screen.test_image.clone())]),
        Spans::from(vec![Span::styled("Settings ", label()), Span::raw(settings_path.to_string())]),
    ]
}

fn status_line(screen: &Screen) -> Spans<'static> {
    let mut spans = vec![
        Span::styled(format!(" {} ", screen.mode.label()), mode_style(screen.mode)),
        Span::raw("| "),
    ];
    match &screen.message {
        Some(msg) => spans.push(Span::styled(msg.clone(), Style::default().fg(Color::Magenta))),
        None => spans.push(Span::styled("h Help  q Quit", label())),
    }
    Spans::from(spans)
}

/// a rect of at most `width` x `height` centred in `area`
fn centred(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn panel(title: String, focused: bool) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        })
}

pub fn draw_frame<B: Backend>(f: &mut Frame<B>, screen: &Screen, settings_path: &str) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(f.size());
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(36), Constraint::Min(0)].as_ref())
        .split(outer[0]);

    let cpu_focused = matches!(screen.focus, Field::Interval | Field::Vector(_));
    f.render_widget(
        Paragraph::new(cpu_lines(screen)).block(panel(" CPU ".to_string(), cpu_focused)),
        columns[0],
    );

    if let Some(mem) = &screen.memory {
        let mut lines = vec![geometry_lines(screen, Some(mem))];
        lines.extend(memory_lines(screen, mem));
        let title = format!(
            " Memory @ {:04X}{} ",
            mem.base,
            if mem.following { " [following]" } else { "" }
        );
        let focused = matches!(
            screen.focus,
            Field::Memory | Field::Rows | Field::Cols | Field::Base
        );
        f.render_widget(Paragraph::new(lines).block(panel(title, focused)), columns[1]);
    }

    f.render_widget(Paragraph::new(status_line(screen)), outer[1]);

    if screen.show_settings {
        let area = centred(outer[0], 60, 5);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(settings_lines(screen, settings_path))
                .block(panel(" Settings ".to_string(), false)),
            area,
        );
    }
    if screen.show_help {
        let lines = help_lines();
        let area = centred(outer[0], 46, lines.len() as u16 + 2);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(lines).block(panel(" Help ".to_string(), false)),
            area,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Machine;
    use crate::cpu::Mos6502;
    use crate::settings::MonitorSettings;
    use crate::surface::ControlSurface;
    use crate::vectors::Vector;
    use std::sync::Arc;
    use tui::backend::TestBackend;

    fn plain(spans: &Spans) -> String {
        spans.0.iter().map(|s| s.content.as_ref()).collect()
    }

    fn screen() -> Screen {
        let machine = Arc::new(Machine::new(Mos6502::try_new().unwrap()));
        let mut s = ControlSurface::new(machine, &MonitorSettings::default());
        s.reset_cpu();
        s.refresh()
    }

    #[test]
    fn test_cpu_panel_text() {
        let lines: Vec<_> = cpu_lines(&screen()).iter().map(plain).collect();
        assert!(lines[0].contains("Stepping"));
        assert!(lines[1].contains("17 ms"));
        assert!(lines[3].contains("FETCH"));
        assert!(lines[5].contains("PC 8000"));
        assert!(lines.iter().any(|l| l.contains("Reset Vector") && l.contains("8000")));
        assert!(lines.iter().any(|l| l.contains("IRQ Vector") && l.contains("0300")));
    }

    #[test]
    fn test_memory_rows() {
        let s = screen();
        let mem = s.memory.as_ref().unwrap();
        let lines: Vec<_> = memory_lines(&s, mem).iter().map(plain).collect();
        assert_eq!(lines.len(), 17);
        assert!(lines[1].starts_with("8000:  A9 00 EA 6C 00 90"));
        assert!(lines[2].starts_with("8010: "));
    }

    #[test]
    fn test_edit_buffer_shown() {
        let mut s = screen();
        s.focus = Field::Vector(Vector::Nmi);
        s.edit = Some("12".into());
        let lines: Vec<_> = cpu_lines(&s).iter().map(plain).collect();
        assert!(lines.iter().any(|l| l.contains("NMI Vector") && l.contains("12_")));
    }

    #[test]
    fn test_help_mentions_reset() {
        assert!(help_lines().iter().any(|l| plain(l).contains("Reset CPU")));
    }

    #[test]
    fn test_draw_on_test_backend() -> Result<(), io::Error> {
        let mut terminal = Terminal::new(TestBackend::new(100, 40))?;
        let s = screen();
        terminal.draw(|f| draw_frame(f, &s, "settings.json"))?;
        let text: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol.as_str())
            .collect();
        assert!(text.contains("Memory @ 8000"));
        assert!(text.contains("Help"));
        Ok(())
    }

    #[test]
    fn test_dummy_counts_frames() -> Result<(), io::Error> {
        let mut d = DummyDisplay::new();
        d.draw(&screen())?;
        assert_eq!(d.frames, 1);
        Ok(())
    }
}
