use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use signature_core::{GalleryState, GatePhase, MessageStore, NoticeKind, TurnRole};
use unicode_width::UnicodeWidthChar;

use crate::app::{App, ChatScreen, InputMode, Screen};

const MENU_WIDTH: u16 = 28;
const JUMP_LABEL: &str = " ↓ nouveau contenu (G) ";

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn role_header(role: TurnRole) -> Line<'static> {
    match role {
        TurnRole::User => Line::from(Span::styled(
            "Vous:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        TurnRole::Assistant => Line::from(Span::styled(
            "IA SIGNATURE:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
    }
}

/// Committed turns followed by the in-flight turn, if any.
fn transcript_lines(store: &MessageStore, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for turn in store.turns() {
        lines.push(role_header(turn.role));
        match turn.role {
            TurnRole::User => {
                for line in turn.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            TurnRole::Assistant => {
                for line in turn.content.lines() {
                    lines.push(parse_markdown_line(line));
                }
            }
        }
        lines.push(Line::default());
    }

    if let Some(in_flight) = store.in_flight() {
        lines.push(role_header(TurnRole::Assistant));
        if in_flight.content.is_empty() {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Réflexion{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        } else {
            let mut content: Vec<Line<'static>> =
                in_flight.content.lines().map(parse_markdown_line).collect();
            if in_flight.content.ends_with('\n') {
                content.push(Line::default());
            }
            let cursor = Span::styled("▌", Style::default().fg(Color::Yellow));
            match content.last_mut() {
                Some(last) => last.spans.push(cursor),
                None => content.push(Line::from(cursor)),
            }
            lines.extend(content);
        }
    }

    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    if app.screen == Screen::Landing {
        app.menu_area = None;
        render_landing(app, frame, body_area);
    } else {
        let [menu_area, content_area] = Layout::horizontal([
            Constraint::Length(MENU_WIDTH),
            Constraint::Min(0),
        ])
        .areas(body_area);

        render_menu(app, frame, menu_area);

        match app.screen {
            Screen::Conversation => render_chat(app, ChatScreen::Conversation, frame, content_area),
            Screen::WhatIf => render_chat(app, ChatScreen::WhatIf, frame, content_area),
            Screen::Tristan | Screen::Magritte => render_gallery(app, frame, content_area),
            Screen::KnowledgeGraph => render_knowledge_graph(app, frame, content_area),
            Screen::Landing => {}
        }
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" IA SIGNATURE ", Style::default().fg(Color::Yellow).bold()),
        Span::styled(format!("— {} ", app.screen.title()), Style::default().fg(Color::White)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match (app.screen, app.input_mode) {
        (Screen::Landing, _) => " ÉNIGME ",
        (_, InputMode::Editing) => " SAISIE ",
        (_, InputMode::Normal) => " NAV ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let mut hints: Vec<Span> = Vec::new();
    match (app.screen, app.input_mode) {
        (Screen::Landing, _) => match app.gate.phase() {
            GatePhase::Hidden => {
                hints.extend(hint(" Enter ", " révéler l'énigme "));
                hints.extend(hint(" Tab ", " entrer "));
                hints.extend(hint(" q ", " quitter "));
            }
            GatePhase::Ready => {
                hints.extend(hint(" Enter ", " répondre "));
                hints.extend(hint(" ^N ", " autre question "));
                hints.extend(hint(" Tab ", " entrer "));
            }
            _ => {}
        },
        (Screen::Conversation | Screen::WhatIf, InputMode::Editing) => {
            hints.extend(hint(" Enter ", " envoyer "));
            hints.extend(hint(" PgUp/PgDn ", " défiler "));
            hints.extend(hint(" Esc ", " naviguer "));
        }
        (Screen::Conversation | Screen::WhatIf, InputMode::Normal) => {
            hints.extend(hint(" i ", " écrire "));
            hints.extend(hint(" j/k ", " défiler "));
            hints.extend(hint(" G ", " bas "));
            if app.screen == Screen::WhatIf {
                hints.extend(hint(" a ", " alternatives "));
                hints.extend(hint(" p ", " ta suite "));
                hints.extend(hint(" c ", " histoire originale "));
            }
            hints.extend(hint(" Tab ", " écran "));
            hints.extend(hint(" q ", " quitter "));
        }
        (Screen::Tristan | Screen::Magritte, _) => {
            hints.extend(hint(" j/k ", " œuvre "));
            hints.extend(hint(" Enter ", " détails "));
            hints.extend(hint(" o ", " ouvrir l'image "));
            hints.extend(hint(" Tab ", " écran "));
            hints.extend(hint(" q ", " quitter "));
        }
        (Screen::KnowledgeGraph, _) => {
            hints.extend(hint(" o ", " ouvrir dans le navigateur "));
            hints.extend(hint(" Tab ", " écran "));
            hints.extend(hint(" q ", " quitter "));
        }
    }

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_menu(app: &mut App, frame: &mut Frame, area: Rect) {
    app.menu_area = Some(area);

    let items: Vec<ListItem> = Screen::MENU
        .iter()
        .enumerate()
        .map(|(i, screen)| ListItem::new(format!(" {} {}", i + 1, screen.title())))
        .collect();

    let mut state = ListState::default();
    state.select(Screen::MENU.iter().position(|s| *s == app.screen));

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Menu "),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_landing(app: &App, frame: &mut Frame, area: Rect) {
    let gate = &app.gate;

    let mut lines: Vec<Line> = vec![
        Line::default(),
        Line::from(Span::styled(
            "La confession muette",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];

    match gate.phase() {
        GatePhase::Hidden => {
            lines.push(Line::from(
                "l'IA SIGNATURE vous invite à répondre à l'énigme du récit pour accéder à la suite de l'expérience.",
            ));
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                "[ Entrée : Révéler l'énigme ]",
                Style::default().fg(Color::Cyan),
            )));
        }
        GatePhase::Loading => {
            lines.push(Line::from(Span::styled(
                "Chargement de l'énigme...",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        _ => {
            if let Some(riddle) = gate.riddle() {
                lines.push(Line::from(Span::styled(
                    riddle.question.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::default());
            }
            let prompt = if gate.answer.is_empty() && gate.phase() == GatePhase::Ready {
                Span::styled("Votre réponse", Style::default().fg(Color::DarkGray))
            } else {
                Span::styled(gate.answer.clone(), Style::default().fg(Color::Cyan))
            };
            lines.push(Line::from(vec![Span::raw("> "), prompt]));
            if gate.phase() == GatePhase::Verifying {
                lines.push(Line::from(Span::styled(
                    "Vérification...",
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
        }
    }

    if let Some(notice) = gate.notice() {
        let color = match notice.kind {
            NoticeKind::Success => Color::Green,
            NoticeKind::Retry => Color::Yellow,
            NoticeKind::Error => Color::Red,
        };
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(notice.text, Style::default().fg(color))));
    }

    let [main_area, credits_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    let main = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Yellow)));
    frame.render_widget(main, main_area);

    let credits = Paragraph::new(Text::from(vec![
        Line::from("Auteur Gaspard Boréal."),
        Line::from("Conception et développement Laurent TRIPIED et Ilyas KHIAT."),
        Line::from("© 2024 IA SIGNATURE. Tous droits réservés."),
    ]))
    .alignment(Alignment::Center)
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(credits, credits_area);
}

fn render_chat(app: &mut App, chat: ChatScreen, frame: &mut Frame, area: Rect) {
    let animation_frame = app.animation_frame;
    let editing = app.input_mode == InputMode::Editing;
    let panel = app.panel_mut(chat);

    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);
    panel.chat_area = Some(chat_area);

    let mut title = match chat {
        ChatScreen::Conversation => " IA SIGNATURE de Magritte ".to_string(),
        ChatScreen::WhatIf => " IA SIGNATURE - Et si... ".to_string(),
    };
    if panel.session.alternatives_loading() {
        title.push_str("(Chargement...) ");
    }

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::DarkGray } else { Color::Yellow }))
        .title(title);
    let inner = chat_block.inner(chat_area);
    frame.render_widget(chat_block, chat_area);

    let transcript = Paragraph::new(Text::from(transcript_lines(panel.session.store(), animation_frame)))
        .wrap(Wrap { trim: false });

    // Measure before scrolling so the controller sees the new height
    let content_height = transcript.line_count(inner.width).min(u16::MAX as usize) as u16;
    panel.scroll.update(content_height, inner.height);

    frame.render_widget(transcript.scroll((panel.scroll.offset(), 0)), inner);

    // "New content below" affordance, bottom-right of the transcript
    panel.jump_area = None;
    if panel.scroll.new_content_below() && inner.height > 0 {
        let width = (JUMP_LABEL.chars().count() as u16).min(inner.width);
        let jump_area = Rect::new(
            inner.x + inner.width - width,
            inner.y + inner.height - 1,
            width,
            1,
        );
        frame.render_widget(Clear, jump_area);
        frame.render_widget(
            Paragraph::new(JUMP_LABEL).style(Style::default().bg(Color::Yellow).fg(Color::Black)),
            jump_area,
        );
        panel.jump_area = Some(jump_area);
    }

    // Input box - highlighted while editing, dimmed while an answer streams
    let streaming = panel.session.store().is_streaming();
    let input_border_color = if streaming {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else {
        Color::Gray
    };
    let placeholder = match chat {
        ChatScreen::Conversation => "Demandez au Phénix...",
        ChatScreen::WhatIf => "Proposez une suite ou posez une question...",
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(if streaming { " Réponse en cours... " } else { " Message " });

    // Horizontal scrolling keeps the cursor visible
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) = input_viewport(&panel.input, panel.cursor, inner_width);

    let input = if panel.input.is_empty() {
        Paragraph::new(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
    } else {
        Paragraph::new(visible_text).style(Style::default().fg(Color::Cyan))
    };
    frame.render_widget(input.block(input_block), input_area);

    if editing {
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

/// Slice of `input` that fits in `width` terminal cells with the cursor
/// visible, and the cursor column within it. `cursor` counts chars.
fn input_viewport(input: &str, cursor: usize, width: usize) -> (String, u16) {
    if width == 0 {
        return (String::new(), 0);
    }

    let widths: Vec<usize> = input
        .chars()
        .map(|c| UnicodeWidthChar::width(c).unwrap_or(0))
        .collect();
    let cursor = cursor.min(widths.len());

    // Drop chars from the left until the text before the cursor, plus the
    // cursor cell itself, fits.
    let mut skip = 0;
    let mut before: usize = widths[..cursor].iter().sum();
    while before + 1 > width && skip < cursor {
        before -= widths[skip];
        skip += 1;
    }

    let mut used = 0;
    let visible: String = input
        .chars()
        .zip(widths.iter())
        .skip(skip)
        .take_while(|(_, w)| {
            used += **w;
            used <= width
        })
        .map(|(c, _)| c)
        .collect();

    (visible, before as u16)
}

fn render_gallery(app: &mut App, frame: &mut Frame, area: Rect) {
    let Some(gallery) = app.active_gallery_mut() else {
        return;
    };
    let title = format!(" Tableaux de {} ", gallery.artist());

    match gallery.state() {
        GalleryState::Loading => {
            let loading = Paragraph::new("Chargement des œuvres...")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))
                .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(loading, area);
        }
        GalleryState::Failed(message) => {
            let error = Paragraph::new(Text::from(vec![
                Line::default(),
                Line::from(Span::styled(
                    format!("Erreur : {}", message),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
            ]))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(error, area);
        }
        GalleryState::Loaded { artworks, selected, detail_open } => {
            let [list_area, preview_area] = Layout::horizontal([
                Constraint::Percentage(40),
                Constraint::Percentage(60),
            ])
            .areas(area);

            let items: Vec<ListItem> = artworks
                .iter()
                .map(|artwork| ListItem::new(format!(" {} ", artwork.name)))
                .collect();
            let mut state = ListState::default();
            state.select(Some(*selected));

            let list = List::new(items)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Yellow))
                        .title(title),
                )
                .highlight_style(
                    Style::default()
                        .bg(Color::Yellow)
                        .fg(Color::Black)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("> ");
            frame.render_stateful_widget(list, list_area, &mut state);

            if let Some(artwork) = artworks.get(*selected) {
                let preview = Paragraph::new(Text::from(vec![
                    Line::from(Span::styled(
                        artwork.name.clone(),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )),
                    Line::from(Span::styled(
                        format!("{}, {}", artwork.artist, artwork.date),
                        Style::default().fg(Color::Gray),
                    )),
                    Line::default(),
                    Line::from(Span::styled(
                        artwork.image_url.clone(),
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
                    )),
                ]))
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).title(" Aperçu "));
                frame.render_widget(preview, preview_area);

                if *detail_open {
                    render_artwork_detail(frame, area, artwork);
                }
            } else {
                let empty = Paragraph::new("Aucune œuvre pour le moment.")
                    .alignment(Alignment::Center)
                    .block(Block::default().borders(Borders::ALL));
                frame.render_widget(empty, preview_area);
            }
        }
    }
}

fn render_artwork_detail(frame: &mut Frame, area: Rect, artwork: &signature_core::Artwork) {
    // Calculate popup size and position (centered)
    let popup_width = (area.width * 3 / 4).max(20).min(area.width);
    let popup_height = (area.height * 3 / 4).max(8).min(area.height);
    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let mut lines = vec![
        Line::from(Span::styled(
            format!("{}, {}", artwork.artist, artwork.date),
            Style::default().fg(Color::Gray),
        )),
        Line::default(),
    ];
    for line in artwork.description.lines() {
        lines.push(Line::from(line.to_string()));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        artwork.image_url.clone(),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
    )));

    let detail = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(format!(" {} (Esc pour fermer) ", artwork.name)),
        );
    frame.render_widget(detail, popup_area);
}

fn render_knowledge_graph(app: &App, frame: &mut Frame, area: Rect) {
    let text = Text::from(vec![
        Line::default(),
        Line::from("Le graphe de connaissances du récit est hébergé en ligne :"),
        Line::default(),
        Line::from(Span::styled(
            app.knowledge_graph_url().to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
        )),
        Line::default(),
        Line::from(Span::styled(
            "Appuyez sur o pour l'ouvrir dans votre navigateur.",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Graphe de connaissances "));
    frame.render_widget(paragraph, area);
}
