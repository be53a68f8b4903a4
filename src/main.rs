mod app;
mod chests;
mod debounce;
mod diag;
mod energy;
mod identity;
mod input;
mod rank;
mod referrals;
mod remote;
mod render;
mod session;
mod state;
mod sync;
mod tasks;
mod time;

use std::{cell::RefCell, io, rc::Rc};

use ratzilla::event::{KeyCode, MouseButton, MouseEventKind};
use ratzilla::ratatui::Terminal;
use ratzilla::{DomBackend, WebRenderer};

use app::App;
use input::{pixel_to_cell, ClickState, InputEvent};
use remote::{DocStore, MemoryStore};
use time::TickClock;

/// Query the grid container's bounding rect and convert pixel coordinates
/// to a cell position.
fn dom_pixel_to_cell(mouse_x: u32, mouse_y: u32, cs: &ClickState) -> Option<(u16, u16)> {
    let window = web_sys::window()?;
    let document = window.document()?;

    // DomBackend creates a <div> as the grid container inside <body>.
    let grid = document.query_selector("body > div").ok()??;
    let rect = grid.get_bounding_client_rect();

    let col = pixel_to_cell(mouse_x as f64 - rect.left(), rect.width(), cs.terminal_cols)?;
    let row = pixel_to_cell(mouse_y as f64 - rect.top(), rect.height(), cs.terminal_rows)?;
    Some((col, row))
}

#[cfg(target_arch = "wasm32")]
fn new_session_id() -> String {
    format!(
        "{:x}-{:08x}",
        js_sys::Date::now() as u64,
        (js_sys::Math::random() * u32::MAX as f64) as u32
    )
}

#[cfg(not(target_arch = "wasm32"))]
fn new_session_id() -> String {
    format!("{:x}", time::now_ms() as u64)
}

fn main() -> io::Result<()> {
    console_error_panic_hook::set_once();

    #[cfg(target_arch = "wasm32")]
    let launch = identity::resolve_launch();
    #[cfg(not(target_arch = "wasm32"))]
    let launch = identity::Launch::offline();

    // The document-store seam; a hosted backend plugs in here.
    let store: Box<dyn DocStore> = Box::new(MemoryStore::new());

    let now = time::now_ms();
    let app = Rc::new(RefCell::new(App::new(launch, store, new_session_id(), now)));
    let clock = Rc::new(RefCell::new(TickClock::new()));
    let click_state = Rc::new(RefCell::new(ClickState::new()));

    let backend = DomBackend::new()?;
    let mut terminal = Terminal::new(backend)?;

    // Mouse/touch handler
    terminal.on_mouse_event({
        let app = app.clone();
        let click_state = click_state.clone();
        move |mouse_event| {
            if mouse_event.kind != MouseEventKind::ButtonDown(MouseButton::Left) {
                return;
            }

            let cs = click_state.borrow();
            if cs.terminal_rows == 0 || cs.terminal_cols == 0 {
                return;
            }
            let (col, row) = (mouse_event.col, mouse_event.row);
            let action = cs.find_action(col, row);
            drop(cs);

            if let Some(action) = action {
                app.borrow_mut()
                    .handle_input(&InputEvent::Click(action), time::now_ms());
            }
        }
    });

    // Keyboard handler
    terminal.on_key_event({
        let app = app.clone();
        move |key_event| {
            if let KeyCode::Char(c) = key_event.code {
                app.borrow_mut()
                    .handle_input(&InputEvent::Key(c), time::now_ms());
            }
        }
    });

    terminal.draw_web({
        let click_state = click_state.clone();
        move |f| {
            let now = time::now_ms();
            let ticks = clock.borrow_mut().advance(now);

            let mut a = app.borrow_mut();
            a.tick(now, ticks);

            let size = f.area();
            {
                let mut cs = click_state.borrow_mut();
                cs.terminal_cols = size.width;
                cs.terminal_rows = size.height;
            }
            render::render(&a, f, size, &click_state);
        }
    });

    Ok(())
}
