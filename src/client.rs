use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc;
use std::time::Duration;

use instant::Instant;
use log::{debug, error, info, warn};

use crate::coord::Coord;
use crate::error::{EventError, ProtocolError};
use crate::event::{Button, ClientEvent, Handshake, NavKey, RawCoord, ReviewSettings, ServerEvent};
use crate::grid::GridItem;
use crate::keepalive::{Keepalive, KeepaliveStatus, Reconnector, KEEPALIVE_INTERVAL, RECONNECT_BACKOFF};
use crate::marks::{letter_char, MarkKind};
use crate::minimap::CELL_STEP;
use crate::pen::{PenPoint, DEFAULT_PEN_COLOR};
use crate::review::{ReviewState, Tool};


pub const WRONG_PASSWORD_MESSAGE: &str = "Wrong password. You can observe, but not edit";
pub const RECONNECTING_MESSAGE: &str = "Reconnecting...";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConnectionMode {
    // Events go to the server, which echoes them to everybody including us.
    Shared,
    // No server: events are applied right away.
    Local,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Modal {
    Info,
    Error,
    Password,
    Upload,
    Settings,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum NotableEvent {
    None,
    BoardUpdated,
    UsersChanged,
    PasswordRequired,
    Toast(String),
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn any(self) -> bool { self.shift || self.ctrl || self.alt }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Key {
    Arrow(NavKey),
    // '0'..='9'
    Digit(u8),
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    // Whether up/down arrows jump between explorer rows rather than switch the preferred branch.
    // Shift inverts it.
    pub branch_jump: bool,
    pub pen_color: String,
    pub keepalive_interval: Duration,
    pub reconnect_backoff: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            branch_jump: true,
            pen_color: DEFAULT_PEN_COLOR.to_owned(),
            keepalive_interval: KEEPALIVE_INTERVAL,
            reconnect_backoff: RECONNECT_BACKOFF,
        }
    }
}

pub struct ClientState {
    mode: ConnectionMode,
    options: ClientOptions,
    events_tx: mpsc::Sender<ClientEvent>,
    review: ReviewState,
    connected: bool,
    modals: BTreeSet<Modal>,
    // User id -> nickname. Empty nicknames belong to guests.
    users: BTreeMap<String, String>,
    protected: bool,
    keepalive: Keepalive,
    reconnector: Reconnector,
}

impl ClientState {
    pub fn new(mode: ConnectionMode, options: ClientOptions, events_tx: mpsc::Sender<ClientEvent>) -> Self {
        let now = Instant::now();
        let mut review = ReviewState::default();
        review.pen_mut().set_color(options.pen_color.clone());
        ClientState {
            mode,
            events_tx,
            review,
            connected: mode == ConnectionMode::Local,
            modals: BTreeSet::new(),
            users: BTreeMap::new(),
            protected: false,
            keepalive: Keepalive::with_interval(options.keepalive_interval, now),
            reconnector: Reconnector::new(options.reconnect_backoff),
            options,
        }
    }

    pub fn mode(&self) -> ConnectionMode { self.mode }
    pub fn review(&self) -> &ReviewState { &self.review }
    pub fn review_mut(&mut self) -> &mut ReviewState { &mut self.review }
    pub fn is_connected(&self) -> bool { self.connected }
    pub fn is_protected(&self) -> bool { self.protected }
    pub fn branch_jump(&self) -> bool { self.options.branch_jump }
    pub fn set_branch_jump(&mut self, branch_jump: bool) { self.options.branch_jump = branch_jump; }

    pub fn modals(&self) -> &BTreeSet<Modal> { &self.modals }
    pub fn open_modal(&mut self, modal: Modal) { self.modals.insert(modal); }
    pub fn close_modal(&mut self, modal: Modal) { self.modals.remove(&modal); }

    // Display names of everyone in the room.
    pub fn user_names(&self) -> Vec<String> {
        self.users
            .iter()
            .map(|(id, nick)| {
                if nick.is_empty() {
                    format!("Guest-{}", id.chars().take(4).collect::<String>())
                } else {
                    nick.clone()
                }
            })
            .collect()
    }

    // Connection lifecycle.

    pub fn connection_established(&mut self) {
        info!("Connected");
        self.connected = true;
        self.reconnector.connected();
        self.keepalive.register_outgoing(Instant::now());
        self.close_modal(Modal::Info);
    }

    // Unconfirmed local state is dropped: the server sends everything again on reconnect.
    pub fn connection_lost(&mut self, now: Instant) {
        if self.mode == ConnectionMode::Local {
            return;
        }
        self.connected = false;
        self.review.reset();
        self.users.clear();
        self.open_modal(Modal::Info);
        self.reconnector.connection_lost(now);
    }

    pub fn should_reconnect(&mut self, now: Instant) -> bool { self.reconnector.should_attempt(now) }

    // Call periodically.
    pub fn refresh(&mut self, now: Instant) {
        if self.mode == ConnectionMode::Shared && self.connected {
            match self.keepalive.update(now) {
                KeepaliveStatus::Noop => {}
                // Not subject to the modal gate: idle connections get dropped by proxies.
                KeepaliveStatus::SendPing => self.transmit(ClientEvent::Ping),
            }
        }
    }

    // Inbound.

    pub fn process_server_message(&mut self, text: &str) -> Result<NotableEvent, EventError> {
        match ServerEvent::parse(text) {
            Ok(event) => self.process_server_event(event),
            Err(err) => {
                warn!("Cannot decode server message {text:?}: {err}");
                Err(self.report_protocol_error(err))
            }
        }
    }

    pub fn process_server_event(&mut self, event: ServerEvent) -> Result<NotableEvent, EventError> {
        use ServerEvent::*;
        let size = self.review.size();
        let review = &mut self.review;
        match event {
            Keydown(key) => match key {
                NavKey::ArrowLeft => {
                    review.left();
                }
                NavKey::ArrowRight => {
                    review.right();
                }
                NavKey::ArrowUp => review.up(),
                NavKey::ArrowDown => review.down(),
            },
            AddStone { coord, color } => {
                if let Some(pos) = coord.resolve(size) {
                    // Illegal moves are logged by the review state; nothing else to do.
                    let _ = review.place_stone(pos, color);
                }
            }
            RemoveStone(coord) => {
                if let Some(pos) = coord.resolve(size) {
                    review.remove_stone(pos);
                }
            }
            Pass(color) => review.pass(color),
            Triangle(coord) => {
                if let Some(pos) = coord.resolve(size) {
                    review.place_triangle(pos);
                }
            }
            Square(coord) => {
                if let Some(pos) = coord.resolve(size) {
                    review.place_square(pos);
                }
            }
            Letter { coord, letter } => {
                if let Some(pos) = coord.resolve(size) {
                    review.place_label(pos, &letter);
                }
            }
            Number { coord, number } => {
                if let Some(pos) = coord.resolve(size) {
                    review.place_number(pos, number);
                }
            }
            RemoveMark(coord) => {
                if let Some(pos) = coord.resolve(size) {
                    review.remove_mark(pos);
                }
            }
            Handshake(handshake) => {
                if let Err(err) = review.handshake(&handshake) {
                    return Err(self.report_protocol_error(err));
                }
            }
            UploadSgf(handshake) => {
                review.reset();
                if let Err(err) = review.handshake(&handshake) {
                    return Err(self.report_protocol_error(err));
                }
            }
            Button(self::Button::Rewind) => review.rewind(),
            Button(self::Button::FastForward) => review.fastforward(),
            GotoGrid(id) => {
                review.goto_index(id);
            }
            GotoCoord(coord) => {
                if let Some(pos) = coord.resolve(size) {
                    review.goto_coord(pos);
                }
            }
            Trash => review.reset(),
            Scissors(id) => {
                // Refusals are logged by the review state.
                let _ = review.cut(id);
            }
            UpdateBuffer(buffer) => review.set_buffer(buffer),
            UpdateSettings(settings) => review.update_settings(&settings),
            Draw(stroke) => review.draw_pen(stroke),
            ErasePen => review.erase_pen(),
            Comment(text) => review.add_comment(&text),
            Frame(frame) => review.apply_frame(&frame),
            Error(message) => {
                error!("Server error: {message}; tree: {}", review.to_sgf());
                self.open_modal(Modal::Error);
                return Err(EventError::ServerReturnedError(message));
            }
            IsProtected(protected) => {
                self.protected = protected;
                if protected {
                    self.open_modal(Modal::Password);
                    return Ok(NotableEvent::PasswordRequired);
                }
                return Ok(NotableEvent::None);
            }
            CheckPassword(password) => {
                self.close_modal(Modal::Password);
                if password.is_empty() {
                    return Ok(NotableEvent::Toast(WRONG_PASSWORD_MESSAGE.to_owned()));
                }
                self.review.set_password(password);
                return Ok(NotableEvent::None);
            }
            Global(message) => return Ok(NotableEvent::Toast(message)),
            Connection { userid } => {
                self.users.entry(userid).or_default();
                return Ok(NotableEvent::UsersChanged);
            }
            Disconnection { userid } => {
                self.users.remove(&userid);
                return Ok(NotableEvent::UsersChanged);
            }
            ConnectedUsers(users) => {
                self.users = users;
                return Ok(NotableEvent::UsersChanged);
            }
            Ping => return Ok(NotableEvent::None),
        }
        Ok(NotableEvent::BoardUpdated)
    }

    // Outbound: user input.

    // `coord` is the board point under the pointer, possibly off the board.
    pub fn click(&mut self, coord: RawCoord, modifiers: Modifiers) {
        let Some(pos) = coord.resolve(self.review.size()) else {
            return;
        };
        let occupied = matches!(self.review.board().get(pos), GridItem::Stone(_));
        let color = self.review.color();
        let event = match self.review.tool() {
            Tool::Pen => return,
            Tool::Mark(kind) => match self.mark_event(pos, kind) {
                Some(event) => event,
                None => return,
            },
            Tool::Stone if self.review.turn().is_toggling() => {
                if modifiers.shift {
                    ClientEvent::GotoCoord(pos)
                } else if occupied {
                    return;
                } else {
                    ClientEvent::AddStone { coord: pos, color }
                }
            }
            Tool::Stone => {
                if occupied {
                    ClientEvent::RemoveStone(pos)
                } else {
                    let color = if modifiers.shift { color.opposite() } else { color };
                    ClientEvent::AddStone { coord: pos, color }
                }
            }
        };
        self.send(event);
    }

    // Pixels relative to the explorer's top-left corner.
    pub fn explorer_click(&mut self, px: f64, py: f64) {
        if let Some(id) = self.review.minimap().capture_mouse(px, py, CELL_STEP) {
            self.send(ClientEvent::GotoGrid(id));
        }
    }

    pub fn key_down(&mut self, key: Key, modifiers: Modifiers) {
        match key {
            Key::Arrow(arrow) => {
                let jump = self.options.branch_jump != modifiers.shift;
                let target = match arrow {
                    NavKey::ArrowUp if jump => Some(self.review.index_up()),
                    NavKey::ArrowDown if jump => Some(self.review.index_down()),
                    _ => None,
                };
                match target {
                    Some(Some(id)) => self.send(ClientEvent::GotoGrid(id)),
                    Some(None) => {}
                    None => self.send(ClientEvent::Keydown(arrow)),
                }
            }
            Key::Digit(_) if modifiers.any() => {}
            Key::Digit(digit) => match digit {
                1 => self.review.set_toggle(),
                2 => self.review.set_black(),
                3 => self.review.set_white(),
                4 => self.pass(),
                5 => self.review.set_tool(Tool::Mark(MarkKind::Triangle)),
                6 => self.review.set_tool(Tool::Mark(MarkKind::Square)),
                7 => self.review.set_tool(Tool::Mark(MarkKind::Letter)),
                8 => self.review.set_tool(Tool::Mark(MarkKind::Number)),
                9 => self.review.set_tool(Tool::Pen),
                0 => self.erase_pen(),
                _ => {}
            },
        }
    }

    pub fn pen_down(&mut self) {
        if self.review.tool() == Tool::Pen {
            self.review.pen_mut().pen_down();
        }
    }

    // Board-relative position in [0, 1].
    pub fn pen_move(&mut self, pos: PenPoint) {
        if self.review.tool() != Tool::Pen {
            return;
        }
        if let Some(stroke) = self.review.pen_mut().pen_move(pos) {
            self.send(ClientEvent::Draw(stroke));
        }
    }

    pub fn pen_up(&mut self) { self.review.pen_mut().pen_up(); }

    // Outbound: buttons and dialogs.

    pub fn left(&mut self) { self.send(ClientEvent::Keydown(NavKey::ArrowLeft)); }
    pub fn right(&mut self) { self.send(ClientEvent::Keydown(NavKey::ArrowRight)); }
    pub fn up(&mut self) { self.send(ClientEvent::Keydown(NavKey::ArrowUp)); }
    pub fn down(&mut self) { self.send(ClientEvent::Keydown(NavKey::ArrowDown)); }
    pub fn rewind(&mut self) { self.send(ClientEvent::Button(Button::Rewind)); }
    pub fn fastforward(&mut self) { self.send(ClientEvent::Button(Button::FastForward)); }
    pub fn pass(&mut self) {
        let color = self.review.color();
        self.send(ClientEvent::Pass(color));
    }
    pub fn scissors(&mut self) {
        let current = self.review.board().current();
        self.send(ClientEvent::Scissors(current));
    }
    pub fn trash(&mut self) { self.send(ClientEvent::Trash); }
    pub fn erase_pen(&mut self) { self.send(ClientEvent::ErasePen); }
    pub fn comment(&mut self, text: String) { self.send(ClientEvent::Comment(text)); }
    pub fn upload_sgf(&mut self, text: &str) { self.send(ClientEvent::upload_sgf(text)); }
    pub fn request_sgf(&mut self, url: String) { self.send(ClientEvent::RequestSgf(url)); }
    pub fn link_ogs_game(&mut self, url: String) { self.send(ClientEvent::LinkOgsGame(url)); }
    pub fn update_buffer(&mut self, buffer: i64) { self.send(ClientEvent::UpdateBuffer(buffer)); }
    pub fn update_settings(&mut self, settings: ReviewSettings) { self.send(ClientEvent::UpdateSettings(settings)); }
    pub fn check_password(&mut self, password: String) { self.send(ClientEvent::CheckPassword(password)); }

    pub fn send(&mut self, event: ClientEvent) {
        if !self.connected {
            debug!("Not connected, dropping {}", event.name());
            return;
        }
        if !self.modals.is_empty() && !event.allowed_while_modal_open() {
            debug!("Dropping {} while {:?} is open", event.name(), self.modals);
            return;
        }
        self.transmit(event);
    }

    fn transmit(&mut self, event: ClientEvent) {
        match self.mode {
            ConnectionMode::Shared => {
                self.keepalive.register_outgoing(Instant::now());
                if let Err(err) = self.events_tx.send(event) {
                    warn!("Cannot send event: {err}");
                }
            }
            ConnectionMode::Local => self.loop_back(event),
        }
    }

    // Without a server the outbound event is decoded as if it had been echoed back.
    fn loop_back(&mut self, event: ClientEvent) {
        use ClientEvent::*;
        let inbound = match event {
            UploadSgf(data) => Ok(ServerEvent::UploadSgf(Handshake { sgf: data, ..Default::default() })),
            RequestSgf(_) | LinkOgsGame(_) | IsProtected | CheckPassword(_) | Ping => {
                debug!("{} needs a server, ignoring", event.name());
                return;
            }
            event => ServerEvent::decode(&event.to_wire()),
        };
        let result = inbound.map_err(EventError::from).and_then(|event| self.process_server_event(event));
        if let Err(err) = result {
            warn!("Cannot apply local event: {err}");
        }
    }

    fn mark_event(&self, pos: Coord, kind: MarkKind) -> Option<ClientEvent> {
        let marks = self.review.marks();
        if marks.has(pos) {
            return Some(ClientEvent::RemoveMark(pos));
        }
        Some(match kind {
            MarkKind::Triangle => ClientEvent::Triangle(pos),
            MarkKind::Square => ClientEvent::Square(pos),
            MarkKind::Number => ClientEvent::Number { coord: pos, number: marks.get_number() },
            MarkKind::Letter => match marks.get_letter() {
                Some(index) => ClientEvent::Letter { coord: pos, letter: letter_char(index).to_string() },
                None => {
                    debug!("All letters are in use");
                    return None;
                }
            },
        })
    }

    fn report_protocol_error(&mut self, err: ProtocolError) -> EventError {
        error!("Protocol error: {err}; tree: {}", self.review.to_sgf());
        self.open_modal(Modal::Error);
        EventError::Protocol(err)
    }
}
