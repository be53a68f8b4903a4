//! Input handling: normalized events, click targets, pixel-to-cell mapping.

use ratzilla::ratatui::layout::Rect;

/// Input events normalized from keyboard, mouse, and touch.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(char),
    /// A tap on a registered target, identified by a semantic action id.
    Click(u16),
}

// Action ids registered by the renderer.
pub const ACTION_TAP: u16 = 1;
pub const ACTION_TASK_BASE: u16 = 100;
pub const ACTION_CHEST_BASE: u16 = 200;

/// A screen region (terminal cell coordinates) that triggers an action.
#[derive(Debug, Clone)]
pub struct ClickTarget {
    pub rect: Rect,
    pub action_id: u16,
}

/// Shared between the render loop (which registers targets every frame) and
/// the mouse handler (which hit-tests against the last frame's targets).
pub struct ClickState {
    pub targets: Vec<ClickTarget>,
    pub terminal_cols: u16,
    pub terminal_rows: u16,
}

impl ClickState {
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
            terminal_cols: 0,
            terminal_rows: 0,
        }
    }

    pub fn clear_targets(&mut self) {
        self.targets.clear();
    }

    pub fn add_target(&mut self, rect: Rect, action_id: u16) {
        self.targets.push(ClickTarget { rect, action_id });
    }

    /// Full-width single-row target inside `area`.
    pub fn add_row_target(&mut self, area: Rect, row: u16, action_id: u16) {
        if row >= area.y && row < area.y + area.height {
            self.add_target(Rect::new(area.x, row, area.width, 1), action_id);
        }
    }

    /// First registered target containing the cell, topmost wins.
    pub fn find_action(&self, col: u16, row: u16) -> Option<u16> {
        self.targets
            .iter()
            .find(|t| {
                col >= t.rect.x
                    && col < t.rect.x + t.rect.width
                    && row >= t.rect.y
                    && row < t.rect.y + t.rect.height
            })
            .map(|t| t.action_id)
    }
}

/// Convert a pixel offset within the grid to a cell coordinate.
pub fn pixel_to_cell(pixel: f64, grid_extent_px: f64, cells: u16) -> Option<u16> {
    if cells == 0 || grid_extent_px <= 0.0 || pixel < 0.0 || pixel >= grid_extent_px {
        return None;
    }
    let cell = (pixel / (grid_extent_px / cells as f64)) as u16;
    Some(cell.min(cells - 1))
}
