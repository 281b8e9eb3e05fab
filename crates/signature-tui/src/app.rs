use std::time::Instant;

use ratatui::layout::Rect;
use signature_core::{
    gallery::ARTISTS, stream::pump, AutoScroll, ChatSession, Gallery, RiddleGate, SignatureClient, StreamUpdate,
    TurnId, WhatIfContext,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Landing,
    Conversation,
    Tristan,
    Magritte,
    WhatIf,
    KnowledgeGraph,
}

impl Screen {
    /// Screens reachable from the sidebar, in menu order
    pub const MENU: [Screen; 5] = [
        Screen::Conversation,
        Screen::Tristan,
        Screen::Magritte,
        Screen::WhatIf,
        Screen::KnowledgeGraph,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Landing => "La confession muette",
            Screen::Conversation => "Conversation IA",
            Screen::Tristan => "Tableaux de Tristan",
            Screen::Magritte => "Tableaux de Magritte",
            Screen::WhatIf => "Et si...",
            Screen::KnowledgeGraph => "Graphe de connaissances",
        }
    }

    pub fn chat(&self) -> Option<ChatScreen> {
        match self {
            Screen::Conversation => Some(ChatScreen::Conversation),
            Screen::WhatIf => Some(ChatScreen::WhatIf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatScreen {
    Conversation,
    WhatIf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// One chat screen: its session, the text being typed and the viewport
pub struct ChatPanel {
    pub session: ChatSession,
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars
    pub scroll: AutoScroll,
    pub task: Option<JoinHandle<()>>,

    // Areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub jump_area: Option<Rect>,
}

impl ChatPanel {
    pub fn new(session: ChatSession) -> Self {
        Self {
            session,
            input: String::new(),
            cursor: 0,
            scroll: AutoScroll::new(),
            task: None,
            chat_area: None,
            jump_area: None,
        }
    }

    /// Abort the running request, if any, and drop its partial answer.
    pub fn cancel_stream(&mut self) -> bool {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.session.cancel()
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    pub gate: RiddleGate,
    pub conversation: ChatPanel,
    pub what_if: ChatPanel,
    pub tristan: Gallery,
    pub magritte: Gallery,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub menu_area: Option<Rect>,

    client: SignatureClient,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(client: SignatureClient, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            screen: Screen::Landing,
            input_mode: InputMode::Normal,

            gate: RiddleGate::new(),
            conversation: ChatPanel::new(ChatSession::conversation()),
            what_if: ChatPanel::new(ChatSession::what_if(WhatIfContext::default())),
            tristan: Gallery::new(ARTISTS[0]),
            magritte: Gallery::new(ARTISTS[1]),

            animation_frame: 0,

            menu_area: None,

            client,
            events,
        }
    }

    pub fn knowledge_graph_url(&self) -> &str {
        &self.client.endpoints().knowledge_graph
    }

    pub fn panel_mut(&mut self, screen: ChatScreen) -> &mut ChatPanel {
        match screen {
            ChatScreen::Conversation => &mut self.conversation,
            ChatScreen::WhatIf => &mut self.what_if,
        }
    }

    pub fn active_panel_mut(&mut self) -> Option<&mut ChatPanel> {
        let chat = self.screen.chat()?;
        Some(self.panel_mut(chat))
    }

    pub fn active_gallery_mut(&mut self) -> Option<&mut Gallery> {
        match self.screen {
            Screen::Tristan => Some(&mut self.tristan),
            Screen::Magritte => Some(&mut self.magritte),
            _ => None,
        }
    }

    pub fn switch_screen(&mut self, screen: Screen) {
        if screen == self.screen {
            return;
        }

        // Leaving a chat screen abandons its running exchange.
        if let Some(panel) = self.active_panel_mut() {
            panel.cancel_stream();
        }

        tracing::debug!(from = ?self.screen, to = ?screen, "switching screen");
        self.screen = screen;
        self.input_mode = if screen.chat().is_some() {
            InputMode::Editing
        } else {
            InputMode::Normal
        };

        if matches!(screen, Screen::Tristan | Screen::Magritte) {
            self.load_gallery();
        }
    }

    pub fn next_screen(&mut self) {
        let idx = Screen::MENU.iter().position(|s| *s == self.screen);
        let next = match idx {
            Some(i) => Screen::MENU[(i + 1) % Screen::MENU.len()],
            None => Screen::MENU[0],
        };
        self.switch_screen(next);
    }

    /// Open the what-if screen for a freshly solved riddle.
    pub fn enter_what_if(&mut self, context: WhatIfContext) {
        self.what_if.cancel_stream();
        self.what_if = ChatPanel::new(ChatSession::what_if(context));
        self.switch_screen(Screen::WhatIf);
    }

    // Chat

    pub fn submit_chat(&mut self, screen: ChatScreen) {
        let client = self.client.clone();
        let tx = self.events.clone();
        let panel = self.panel_mut(screen);

        let Some(exchange) = panel.session.submit(&panel.input) else {
            return;
        };
        panel.input.clear();
        panel.cursor = 0;
        panel.scroll.scroll_to_bottom();

        let endpoint = panel.session.endpoint();
        panel.task = Some(tokio::spawn(async move {
            let id = exchange.id;
            let send = |update: StreamUpdate| {
                tx.send(AppEvent::Stream { screen, id, update }).is_ok()
            };

            match client
                .open_chat_stream(endpoint, &exchange.query, &exchange.history)
                .await
            {
                Ok(fragments) => {
                    pump(fragments, send).await;
                }
                Err(err) => {
                    send(StreamUpdate::Failed(err));
                }
            }
        }));
    }

    pub fn apply_stream(&mut self, screen: ChatScreen, id: TurnId, update: StreamUpdate) {
        let panel = self.panel_mut(screen);
        panel.session.apply(id, update);
        if !panel.session.store().is_streaming() {
            panel.task = None;
        }
    }

    pub fn discover_alternatives(&mut self) {
        let Some(context) = self.what_if.session.begin_alternatives() else {
            return;
        };

        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client
                .fetch_alternatives(&context.question, &context.answer)
                .await;
            let _ = tx.send(AppEvent::AlternativesLoaded(result));
        });
    }

    // Riddle gate

    pub fn request_riddle(&mut self) {
        if !self.gate.request_riddle() {
            return;
        }

        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.fetch_riddle().await;
            let _ = tx.send(AppEvent::RiddleLoaded(result));
        });
    }

    pub fn submit_riddle_answer(&mut self) {
        let Some(request) = self.gate.submit() else {
            return;
        };

        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.verify_riddle(&request).await;
            let _ = tx.send(AppEvent::VerdictReceived(result));
        });
    }

    // Galleries

    fn load_gallery(&mut self) {
        let client = self.client.clone();
        let tx = self.events.clone();
        let Some(gallery) = self.active_gallery_mut() else {
            return;
        };
        if !gallery.request_load() {
            return;
        }

        let artist = gallery.artist();
        tokio::spawn(async move {
            let result = client.fetch_artworks(artist).await;
            let _ = tx.send(AppEvent::ArtworksLoaded { artist, result });
        });
    }

    pub fn gallery_mut(&mut self, artist: &str) -> Option<&mut Gallery> {
        if self.tristan.artist() == artist {
            Some(&mut self.tristan)
        } else if self.magritte.artist() == artist {
            Some(&mut self.magritte)
        } else {
            None
        }
    }

    /// Tick animation frame and gate timers (called by Tick event)
    pub fn tick(&mut self, now: Instant) {
        let streaming = self.conversation.session.store().is_streaming()
            || self.what_if.session.store().is_streaming();
        if streaming {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }

        // Runs on every screen so a solved riddle always reaches what-if.
        if let Some(context) = self.gate.tick(now) {
            tracing::info!("riddle solved, entering what-if");
            self.enter_what_if(context);
        }
    }

    pub fn shutdown(&mut self) {
        self.conversation.cancel_stream();
        self.what_if.cancel_stream();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use signature_core::{riddle::PASS_DELAY, Config, Riddle, StreamError, Verdict};
    use tokio::sync::mpsc;

    use crate::handler::handle_event;

    fn test_app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = Config {
            // Nothing listens here; requests fail fast if they are ever sent.
            api_base: Some("http://127.0.0.1:9".to_string()),
            chat_url: Some("http://127.0.0.1:9/generate".to_string()),
            knowledge_graph_url: None,
        };
        let app = App::new(SignatureClient::new(config.endpoints()), tx);
        (app, rx)
    }

    #[tokio::test]
    async fn test_leaving_chat_cancels_stream() {
        let (mut app, _rx) = test_app();
        app.switch_screen(Screen::Conversation);
        app.conversation.input = "Bonjour".to_string();
        app.submit_chat(ChatScreen::Conversation);

        assert!(app.conversation.session.store().is_streaming());
        assert!(app.conversation.input.is_empty());

        app.switch_screen(Screen::Tristan);
        assert!(!app.conversation.session.store().is_streaming());
        assert!(app.conversation.task.is_none());
        assert_eq!(app.conversation.session.store().turns().len(), 2);
    }

    #[tokio::test]
    async fn test_second_submit_while_streaming_is_ignored() {
        let (mut app, _rx) = test_app();
        app.switch_screen(Screen::Conversation);
        app.conversation.input = "first".to_string();
        app.submit_chat(ChatScreen::Conversation);

        app.conversation.input = "second".to_string();
        app.submit_chat(ChatScreen::Conversation);

        assert_eq!(app.conversation.input, "second");
        assert_eq!(app.conversation.session.store().turns().len(), 2);
    }

    #[tokio::test]
    async fn test_stream_events_reach_the_right_panel() {
        let (mut app, _rx) = test_app();
        app.switch_screen(Screen::Conversation);
        app.conversation.input = "Bonjour".to_string();
        app.submit_chat(ChatScreen::Conversation);
        let id = app.conversation.session.store().in_flight().unwrap().id;

        app.apply_stream(ChatScreen::Conversation, id, StreamUpdate::Fragment("Sa".into()));
        app.apply_stream(ChatScreen::Conversation, id, StreamUpdate::Fragment("lut".into()));
        app.apply_stream(ChatScreen::Conversation, id, StreamUpdate::Finished);

        let turns = app.conversation.session.store().turns();
        assert_eq!(turns.last().map(|t| t.content.as_str()), Some("Salut"));
        assert!(app.conversation.task.is_none());
        assert_eq!(app.what_if.session.store().turns().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_failure_event() {
        let (mut app, mut rx) = test_app();
        app.switch_screen(Screen::Conversation);
        app.conversation.input = "Bonjour".to_string();
        app.submit_chat(ChatScreen::Conversation);

        match rx.recv().await {
            Some(AppEvent::Stream { screen, update, .. }) => {
                assert_eq!(screen, ChatScreen::Conversation);
                assert!(matches!(update, StreamUpdate::Failed(StreamError::Transport(_))));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_enter_what_if_resets_session() {
        let (mut app, _rx) = test_app();
        app.enter_what_if(WhatIfContext::new("Quel symbole ?", "le phénix"));

        assert_eq!(app.screen, Screen::WhatIf);
        assert_eq!(app.input_mode, InputMode::Editing);
        let context = app.what_if.session.context().unwrap();
        assert_eq!(context.answer, "le phénix");
    }

    #[tokio::test]
    async fn test_next_screen_cycles_menu() {
        let (mut app, _rx) = test_app();
        app.next_screen();
        assert_eq!(app.screen, Screen::Conversation);
        for _ in 0..Screen::MENU.len() {
            app.next_screen();
        }
        assert_eq!(app.screen, Screen::Conversation);
    }

    #[tokio::test]
    async fn test_solved_riddle_reaches_what_if_after_delay() {
        let (mut app, _rx) = test_app();
        assert!(app.gate.request_riddle());
        app.gate.riddle_loaded(Ok(Riddle {
            question: "Quel oiseau renaît ?".to_string(),
            answers: vec!["le phénix".to_string()],
        }));
        app.gate.answer = "le phénix".to_string();
        assert!(app.gate.submit().is_some());

        let t0 = Instant::now();
        app.gate.verdict_received(Ok(Verdict { score: true }), t0);

        // Tab during the pass delay must not strand the solved riddle.
        let tab = KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE);
        handle_event(&mut app, AppEvent::Key(tab)).unwrap();
        assert_eq!(app.screen, Screen::Landing);

        app.tick(t0 + Duration::from_millis(500));
        assert_eq!(app.screen, Screen::Landing);

        app.tick(t0 + PASS_DELAY + Duration::from_millis(1));
        assert_eq!(app.screen, Screen::WhatIf);
        let context = app.what_if.session.context().unwrap();
        assert_eq!(context.question, "Quel oiseau renaît ?");
        assert_eq!(context.answer, "le phénix");

        // Navigation fires once.
        app.switch_screen(Screen::Conversation);
        app.tick(t0 + PASS_DELAY * 3);
        assert_eq!(app.screen, Screen::Conversation);
    }

    #[tokio::test]
    async fn test_pending_verdict_survives_leaving_the_gate() {
        let (mut app, _rx) = test_app();
        app.gate.request_riddle();
        app.gate.riddle_loaded(Ok(Riddle {
            question: "Quel symbole ?".to_string(),
            answers: vec!["la colombe".to_string()],
        }));
        app.gate.answer = "la colombe".to_string();
        app.gate.submit();

        let t0 = Instant::now();
        app.gate.verdict_received(Ok(Verdict { score: true }), t0);
        app.switch_screen(Screen::Conversation);

        app.tick(t0 + PASS_DELAY + Duration::from_secs(1));
        assert_eq!(app.screen, Screen::WhatIf);
        assert_eq!(app.what_if.session.context().unwrap().answer, "la colombe");
    }

    #[tokio::test]
    async fn test_resize_keeps_screen_state() {
        let (mut app, _rx) = test_app();
        app.switch_screen(Screen::Conversation);
        app.conversation.input = "brouillon".to_string();

        handle_event(&mut app, AppEvent::Resize).unwrap();

        assert_eq!(app.screen, Screen::Conversation);
        assert_eq!(app.conversation.input, "brouillon");
    }
}
