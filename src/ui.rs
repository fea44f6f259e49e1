use crate::app::App;
use crate::braille::BrailleCanvas;
use crate::choropleth::Rgb;
use crate::data::LayerId;
use crate::interaction::Tooltip;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
    Frame,
};

fn rgb(c: Rgb) -> Color {
    Color::Rgb(c.0, c.1, c.2)
}

/// Render the UI
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Split into map area and status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_map(frame, app, chunks[0]);
    render_status_bar(frame, app, chunks[1]);
}

fn render_map(frame: &mut Frame, app: &mut App, area: Rect) {
    let title = if app.store.is_demo() { " Boundaries (demo data) " } else { " Boundaries " };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let Some(message) = app.init_error() {
        let text = Paragraph::new(Line::from(Span::styled(
            format!(" {message}"),
            Style::default().fg(Color::Red),
        )));
        frame.render_widget(text, inner);
        return;
    }

    let canvas = app.frame();
    frame.render_widget(MapWidget { canvas }, inner);

    let tooltip = app.controller.tooltip();
    if tooltip.is_visible() {
        render_tooltip(frame, tooltip, inner);
    }
}

/// Draws painted braille cells: dots in the cell's foreground colour
/// over its fill colour
struct MapWidget<'a> {
    canvas: &'a BrailleCanvas,
}

impl Widget for MapWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for row in 0..self.canvas.height().min(area.height as usize) {
            let y = area.y + row as u16;
            for (col, cell) in self.canvas.row_cells(row).iter().enumerate() {
                if col >= area.width as usize {
                    break;
                }
                let x = area.x + col as u16;
                let target = &mut buf[(x, y)];
                target.set_char(cell.glyph()).set_bg(rgb(cell.bg));
                if let Some(fg) = cell.fg {
                    target.set_fg(rgb(fg));
                }
            }
        }
    }
}

/// Bordered box at the tooltip position, kept inside the map area
fn render_tooltip(frame: &mut Frame, tooltip: &Tooltip, area: Rect) {
    let lines: Vec<Line> = tooltip
        .lines
        .iter()
        .map(|l| {
            let mut style = Style::default().fg(l.color.map_or(Color::Black, rgb));
            if l.bold {
                style = style.add_modifier(Modifier::BOLD);
            }
            Line::from(Span::styled(l.text.clone(), style))
        })
        .collect();

    let content_width = lines.iter().map(Line::width).max().unwrap_or(0) as u16;
    let width = (content_width + 2).min(area.width);
    let height = (lines.len() as u16 + 2).min(area.height);
    if width < 3 || height < 3 {
        return;
    }

    // Braille pixels to cells
    let col = (tooltip.position.x / 2.0).max(0.0) as u16;
    let row = (tooltip.position.y / 4.0).max(0.0) as u16;
    let x = area.x + col.min(area.width - width);
    let y = area.y + row.min(area.height - height);
    let rect = Rect::new(x, y, width, height);

    let paragraph = Paragraph::new(lines)
        .style(Style::default().bg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Gray)),
        );
    frame.render_widget(Clear, rect);
    frame.render_widget(paragraph, rect);
}

fn toggle_span(label: &'static str, on: bool) -> Span<'static> {
    Span::styled(label, Style::default().fg(if on { Color::Green } else { Color::DarkGray }))
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let visibility = app.pipeline().map(|p| p.visibility()).unwrap_or_default();
    let shown = |layer: LayerId| visibility.is_visible(layer) && app.store.is_loaded(layer);

    let mut spans = vec![
        Span::styled(" Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        toggle_span("[1]番界 ", shown(LayerId::Historical)),
        toggle_span("[2]得票 ", shown(LayerId::Administrative)),
        toggle_span("[3]風險 ", shown(LayerId::RiskGrid)),
    ];
    if let Some(range) = app.range_summary() {
        spans.push(Span::styled("| ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(range, Style::default().fg(Color::Magenta)));
        spans.push(Span::raw(" "));
    }
    if let Some(coords) = app.pointer_coords() {
        spans.push(Span::styled("| ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(coords, Style::default().fg(Color::Cyan)));
        spans.push(Span::raw(" "));
    }
    if let Some(label) = app.hovered_label() {
        spans.push(Span::styled("| ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(label.to_string(), Style::default().fg(Color::White)));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(
        "| hjkl:pan +/-:zoom r:reset R:reload q:quit",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
