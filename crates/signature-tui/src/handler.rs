use std::time::Instant;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use signature_core::GatePhase;

use crate::app::{App, ChatScreen, InputMode, Screen};
use crate::tui::AppEvent;

const HALF_PAGE: u16 = 10;
const WHEEL_LINES: u16 = 3;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick(Instant::now()),
        AppEvent::Stream { screen, id, update } => app.apply_stream(screen, id, update),
        AppEvent::RiddleLoaded(result) => app.gate.riddle_loaded(result),
        AppEvent::VerdictReceived(result) => app.gate.verdict_received(result, Instant::now()),
        AppEvent::ArtworksLoaded { artist, result } => {
            if let Some(gallery) = app.gallery_mut(artist) {
                gallery.loaded(result);
            }
        }
        AppEvent::AlternativesLoaded(result) => {
            app.what_if.session.alternatives_received(result);
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.screen == Screen::Landing {
        handle_landing(app, key);
        return;
    }

    match (app.screen.chat(), app.input_mode) {
        (Some(chat), InputMode::Editing) => handle_chat_editing(app, chat, key),
        (Some(chat), InputMode::Normal) => handle_chat_normal(app, chat, key),
        (None, _) if matches!(app.screen, Screen::Tristan | Screen::Magritte) => {
            handle_gallery(app, key)
        }
        (None, _) => handle_knowledge_graph(app, key),
    }
}

/// Keys shared by every screen behind the sidebar. Returns true if handled.
fn handle_menu_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Tab => app.next_screen(),
        KeyCode::Char(c @ '1'..='5') => {
            let idx = (c as usize) - ('1' as usize);
            app.switch_screen(Screen::MENU[idx]);
        }
        _ => return false,
    }
    true
}

fn handle_landing(app: &mut App, key: KeyEvent) {
    // The gate has no menu, but the rest of the experience stays reachable.
    // Not while a verdict is pending or being acted on.
    if key.code == KeyCode::Tab && !app.gate.is_busy() {
        app.switch_screen(Screen::Conversation);
        return;
    }

    match app.gate.phase() {
        GatePhase::Hidden => match key.code {
            KeyCode::Enter | KeyCode::Char('r') => app.request_riddle(),
            KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
            _ => {}
        },
        GatePhase::Ready => match key.code {
            KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.request_riddle();
            }
            KeyCode::Enter => app.submit_riddle_answer(),
            KeyCode::Esc => app.gate.answer.clear(),
            KeyCode::Backspace => {
                app.gate.answer.pop();
            }
            KeyCode::Char(c) => app.gate.answer.push(c),
            _ => {}
        },
        GatePhase::Loading | GatePhase::Verifying | GatePhase::Passed { .. } | GatePhase::Done => {}
    }
}

fn handle_chat_normal(app: &mut App, chat: ChatScreen, key: KeyEvent) {
    if handle_menu_key(app, key) {
        return;
    }

    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,

        // What-if actions
        KeyCode::Char('a') if chat == ChatScreen::WhatIf => app.discover_alternatives(),
        KeyCode::Char('p') if chat == ChatScreen::WhatIf => {
            app.what_if.session.propose_own_continuation();
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('c') if chat == ChatScreen::WhatIf => {
            app.what_if.session.continue_original_story();
        }

        _ => {
            let panel = app.panel_mut(chat);
            match key.code {
                KeyCode::Char('j') | KeyCode::Down => panel.scroll.scroll_down(1),
                KeyCode::Char('k') | KeyCode::Up => panel.scroll.scroll_up(1),
                KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    panel.scroll.scroll_down(HALF_PAGE);
                }
                KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    panel.scroll.scroll_up(HALF_PAGE);
                }
                KeyCode::Char('G') | KeyCode::End => panel.scroll.scroll_to_bottom(),
                _ => {}
            }
        }
    }
}

fn handle_chat_editing(app: &mut App, chat: ChatScreen, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            return;
        }
        KeyCode::Tab => {
            app.next_screen();
            return;
        }
        KeyCode::Enter => {
            app.submit_chat(chat);
            return;
        }
        _ => {}
    }

    let panel = app.panel_mut(chat);
    match key.code {
        KeyCode::Backspace => {
            if panel.cursor > 0 {
                panel.cursor -= 1;
                let byte_pos = char_to_byte_index(&panel.input, panel.cursor);
                panel.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = panel.input.chars().count();
            if panel.cursor < char_count {
                let byte_pos = char_to_byte_index(&panel.input, panel.cursor);
                panel.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            panel.cursor = panel.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = panel.input.chars().count();
            panel.cursor = (panel.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            panel.cursor = 0;
        }
        KeyCode::End => {
            panel.cursor = panel.input.chars().count();
        }
        KeyCode::PageUp => panel.scroll.scroll_up(HALF_PAGE),
        KeyCode::PageDown => panel.scroll.scroll_down(HALF_PAGE),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&panel.input, panel.cursor);
            panel.input.insert(byte_pos, c);
            panel.cursor += 1;
        }
        _ => {}
    }
}

fn handle_gallery(app: &mut App, key: KeyEvent) {
    let detail_open = app
        .active_gallery_mut()
        .map(|g| g.detail_open())
        .unwrap_or(false);

    if !detail_open && handle_menu_key(app, key) {
        return;
    }

    let Some(gallery) = app.active_gallery_mut() else {
        return;
    };

    match key.code {
        KeyCode::Char('j') | KeyCode::Down => gallery.select_next(),
        KeyCode::Char('k') | KeyCode::Up => gallery.select_prev(),
        KeyCode::Enter => gallery.open_detail(),
        KeyCode::Esc | KeyCode::Char('q') => gallery.close_detail(),
        KeyCode::Char('o') => {
            if let Some(artwork) = gallery.selected() {
                open_url(&artwork.image_url);
            }
        }
        _ => {}
    }
}

fn handle_knowledge_graph(app: &mut App, key: KeyEvent) {
    if handle_menu_key(app, key) {
        return;
    }

    if let KeyCode::Char('o') | KeyCode::Enter = key.code {
        open_url(app.knowledge_graph_url());
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
        if let Some(menu) = app.menu_area.filter(|r| point_in_rect(x, y, *r)) {
            // First row is the border
            let row = y.saturating_sub(menu.y + 1) as usize;
            if let Some(screen) = Screen::MENU.get(row) {
                app.switch_screen(*screen);
            }
            return;
        }
    }

    let Some(panel) = app.active_panel_mut() else {
        return;
    };
    let in_chat = panel.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_jump = panel.jump_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown if in_chat => panel.scroll.scroll_down(WHEEL_LINES),
        MouseEventKind::ScrollUp if in_chat => panel.scroll.scroll_up(WHEEL_LINES),
        MouseEventKind::Down(MouseButton::Left) if in_jump => panel.scroll.scroll_to_bottom(),
        _ => {}
    }
}

fn open_url(url: &str) {
    use std::process::{Command, Stdio};

    let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
    let spawned = Command::new(opener)
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    if let Err(err) = spawned {
        tracing::warn!(%url, error = %err, "could not open url");
    }
}
