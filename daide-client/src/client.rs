use daide_defs::{
    DecodeError, Message, Node, Token,
    board::{GameError, Gameboard},
    catalog, msg,
};
use daide_util::connection::{Connection, ConnectionError, FrameKind};
use thiserror::Error;

use crate::strategy::OrderStrategy;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unexpected {0:?} frame")]
    UnexpectedFrame(FrameKind),
    #[error("Server rejected the registration")]
    RegistrationRejected,
    #[error("Server error message {0:#06X}")]
    ErrorMessage(u16),
    #[error("Unknown map variant {0:?}")]
    UnexpectedVariant(String),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// How the client registers with the adjudicator.
#[derive(Debug, Clone)]
pub enum Role {
    Player { name: String, version: String },
    Observer,
}

/// Why the event loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server sent a final message.
    ServerClosed,
    /// OFF/DRW/SLO, or our power was eliminated.
    GameOver,
}

/// Map variants this client knows the rules for.
const KNOWN_VARIANTS: &[&str] = &["standard"];

/// One registered session: owns the connection and the gameboard,
/// routes inbound diplomacy messages by their leading token, and
/// answers with the responses the protocol prescribes.
pub struct Client {
    connection: Connection,
    role: Role,
    strategy: Option<Box<dyn OrderStrategy>>,
    board: Option<Gameboard>,
    variant: Option<String>,
    power: Option<Token>,
    passcode: Option<i32>,
    press_level: i32,
}

impl Client {
    pub fn new(connection: Connection, role: Role) -> Self {
        Self {
            connection,
            role,
            strategy: None,
            board: None,
            variant: None,
            power: None,
            passcode: None,
            press_level: 0,
        }
    }

    pub fn with_strategy(mut self, strategy: impl OrderStrategy + 'static) -> Self {
        self.strategy = Some(Box::new(strategy));
        self
    }

    pub fn power(&self) -> Option<Token> {
        self.power
    }

    pub fn board(&self) -> Option<&Gameboard> {
        self.board.as_ref()
    }

    fn send_message(&mut self, message: &Message) -> Result<(), ClientError> {
        self.connection.send_diplomacy(&message.pack())?;
        Ok(())
    }

    /// Initial message, then NME or OBS depending on the role.
    pub fn register(&mut self) -> Result<(), ClientError> {
        self.connection.send_initial()?;
        let registration = match &self.role {
            Role::Player { name, version } => Message::of(catalog::NME)
                .apply(msg![name]?)
                .apply(msg![version]?),
            Role::Observer => Message::of(catalog::OBS),
        };
        self.send_message(&registration)
    }

    /// Rejoin an interrupted game with the identity the HLO gave us.
    pub fn send_iam(&mut self) -> Result<(), ClientError> {
        let (Some(power), Some(passcode)) = (self.power, self.passcode) else {
            return Ok(());
        };
        let iam = Message::of(catalog::IAM)
            .apply(Message::of(power))
            .apply(msg![passcode]?);
        self.send_message(&iam)
    }

    /// Receives and dispatches frames until the session ends or an
    /// error surfaces. Undecodable diplomacy frames are dropped.
    pub fn run(&mut self) -> Result<SessionEnd, ClientError> {
        loop {
            let frame = self.connection.recv()?;
            match frame.kind {
                FrameKind::Initial => {
                    return Err(ProtocolError::UnexpectedFrame(FrameKind::Initial).into());
                }
                FrameKind::Representation => {
                    println!(
                        "server declared its own representation ({} bytes), keeping the built-in table",
                        frame.payload.len()
                    );
                }
                FrameKind::Diplomacy => match Message::from_bytes(&frame.payload) {
                    Ok(message) => match self.handle_diplomacy(&message) {
                        Ok(None) => {}
                        Ok(Some(end)) => {
                            self.connection.close()?;
                            return Ok(end);
                        }
                        Err(err @ (ClientError::Decode(_) | ClientError::Game(_))) => {
                            eprintln!("dropping {}: {}", message, err);
                        }
                        Err(err) => return Err(err),
                    },
                    Err(err) => eprintln!("dropping undecodable diplomacy frame: {}", err),
                },
                FrameKind::Final => {
                    self.connection.close()?;
                    return Ok(SessionEnd::ServerClosed);
                }
                FrameKind::Error => {
                    let code = match frame.payload.as_ref() {
                        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
                        _ => 0,
                    };
                    return Err(ProtocolError::ErrorMessage(code).into());
                }
            }
        }
    }

    fn handle_diplomacy(&mut self, message: &Message) -> Result<Option<SessionEnd>, ClientError> {
        let Some(head) = message.first() else {
            return Ok(None);
        };
        match head {
            catalog::MAP => self.handle_map(message)?,
            catalog::MDF => self.handle_mdf(message)?,
            catalog::HLO => self.handle_hlo(message)?,
            catalog::SCO => self.handle_sco(message)?,
            catalog::NOW => self.handle_now(message)?,
            catalog::ORD => self.handle_ord(message)?,
            catalog::THX => self.handle_thx(message)?,
            catalog::CCD => println!("{}", message),
            catalog::HUH => eprintln!("server could not parse our message: {}", message),
            catalog::OUT => return self.handle_out(message),
            catalog::DRW | catalog::SLO | catalog::OFF => {
                println!("game over: {}", message);
                return Ok(Some(SessionEnd::GameOver));
            }
            catalog::YES => self.handle_yes(message)?,
            catalog::REJ => return self.handle_rej(message),
            _ => println!("ignoring {}", message),
        }
        Ok(None)
    }

    /// `MAP ('name')`: ask for the definition if we have none yet,
    /// otherwise accept or reject the variant by name.
    fn handle_map(&mut self, message: &Message) -> Result<(), ClientError> {
        let folded = message.fold()?;
        let name = map_name(&folded).ok_or(GameError::Malformed("MAP without a name"))?;
        self.variant = Some(name.clone());
        if self.board.is_none() {
            self.send_message(&Message::of(catalog::MDF))
        } else if KNOWN_VARIANTS.contains(&name.to_ascii_lowercase().as_str()) {
            let reply = Message::of(catalog::YES).apply(message.clone());
            self.send_message(&reply)
        } else {
            let reply = Message::of(catalog::REJ).apply(message.clone());
            self.send_message(&reply)
        }
    }

    fn handle_mdf(&mut self, message: &Message) -> Result<(), ClientError> {
        let mut board = Gameboard::from_mdf(message)?;
        if let Some(power) = self.power {
            board.set_power_played(power);
        }
        self.board = Some(board);
        if let Some(variant) = self.variant.clone() {
            let reply = Message::of(catalog::YES)
                .apply(Message::of(catalog::MAP).apply(msg![&variant]?));
            self.send_message(&reply)?;
        }
        Ok(())
    }

    /// `HLO (power) (passcode) (options)`: the identity we play,
    /// plus the press level when the options carry one.
    fn handle_hlo(&mut self, message: &Message) -> Result<(), ClientError> {
        let folded = message.fold()?;
        let [_, power, passcode, options] = folded.as_slice() else {
            return Err(GameError::Malformed("HLO takes three argument lists").into());
        };
        let power = single_token(power).ok_or(GameError::Malformed("HLO without a power"))?;
        self.power = Some(power);
        self.passcode = match passcode.as_list() {
            Some([Node::Integer(code)]) => Some(*code),
            _ => None,
        };
        if let Some(options) = options.as_list() {
            for option in options {
                if let Some([name, Node::Integer(level)]) = option.as_list()
                    && name.as_token() == Some(catalog::LVL)
                {
                    self.press_level = *level;
                }
            }
        }
        if let Some(board) = self.board.as_mut() {
            board.set_power_played(power);
        }
        println!("playing {} at press level {}", power, self.press_level);
        Ok(())
    }

    /// SCO updates ownership; with a turn installed this is also the
    /// cue to generate and submit the orders for the phase.
    fn handle_sco(&mut self, message: &Message) -> Result<(), ClientError> {
        let board = self.board.as_mut().ok_or(GameError::NoMap)?;
        board.process_sco(message)?;
        self.generate_and_submit()
    }

    fn generate_and_submit(&mut self) -> Result<(), ClientError> {
        let Some(board) = self.board.as_mut() else {
            return Ok(());
        };
        let Some(strategy) = self.strategy.as_mut() else {
            return Ok(());
        };
        if board.power_played().is_none() || board.season().is_none() {
            return Ok(());
        }
        strategy.generate(board)?;
        let orders = board.get_orders();
        if orders.is_empty() {
            return Ok(());
        }
        let submission = Message::of(catalog::SUB).concat(orders);
        println!("submitting {}", submission);
        self.send_message(&submission)
    }

    fn handle_now(&mut self, message: &Message) -> Result<(), ClientError> {
        let board = self.board.as_mut().ok_or(GameError::NoMap)?;
        board.process_now(message)?;
        Ok(())
    }

    fn handle_ord(&mut self, message: &Message) -> Result<(), ClientError> {
        let board = self.board.as_mut().ok_or(GameError::NoMap)?;
        if !board.process_ord(message)? {
            eprintln!("result for an order we never submitted: {}", message);
        }
        Ok(())
    }

    /// `THX (order) (note)`: MBV is the all-clear, anything else
    /// means the server refused the order.
    fn handle_thx(&mut self, message: &Message) -> Result<(), ClientError> {
        let folded = message.fold()?;
        let [_, _, note] = folded.as_slice() else {
            return Err(GameError::Malformed("THX takes an order and a note").into());
        };
        match single_token(note) {
            Some(catalog::MBV) => {}
            Some(note) => eprintln!("order refused with {}: {}", note, message),
            None => eprintln!("order acknowledged oddly: {}", message),
        }
        Ok(())
    }

    fn handle_out(&mut self, message: &Message) -> Result<Option<SessionEnd>, ClientError> {
        let folded = message.fold()?;
        let power = folded.get(1).and_then(single_token);
        if power.is_some() && power == self.power {
            println!("we have been eliminated");
            return Ok(Some(SessionEnd::GameOver));
        }
        println!("{}", message);
        Ok(None)
    }

    fn handle_yes(&mut self, message: &Message) -> Result<(), ClientError> {
        match message.get(2) {
            Some(catalog::MAP) => println!("map accepted"),
            Some(catalog::NME) | Some(catalog::OBS) | Some(catalog::IAM) => {
                println!("registration accepted")
            }
            _ => {}
        }
        Ok(())
    }

    /// A rejected registration ends the session; a rejected map
    /// answer makes us ask for the definition again.
    fn handle_rej(&mut self, message: &Message) -> Result<Option<SessionEnd>, ClientError> {
        match message.get(2) {
            Some(catalog::NME) | Some(catalog::OBS) | Some(catalog::IAM) => {
                Err(ProtocolError::RegistrationRejected.into())
            }
            Some(catalog::MAP) => {
                eprintln!("map answer rejected, requesting the definition");
                self.send_message(&Message::of(catalog::MDF))?;
                Ok(None)
            }
            _ => {
                println!("ignoring {}", message);
                Ok(None)
            }
        }
    }
}

/// The quoted name of `MAP ('name')`.
fn map_name(folded: &[Node]) -> Option<String> {
    match folded {
        [_, Node::List(args)] => match args.as_slice() {
            [Node::Text(name)] => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// The single token of a one-element list node.
fn single_token(node: &Node) -> Option<Token> {
    match node.as_list() {
        Some([item]) => item.as_token(),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use std::net::TcpListener;

    use daide_defs::{Message, catalog, msg};
    use daide_util::connection::{Connection, FrameKind};

    use super::{Client, ClientError, ProtocolError, Role, SessionEnd};
    use crate::strategy::HoldStrategy;

    fn expect_diplomacy(server: &mut Connection) -> Message {
        let frame = server.recv().unwrap();
        assert_eq!(frame.kind, FrameKind::Diplomacy);
        Message::from_bytes(&frame.payload).unwrap()
    }

    fn session(role: Role) -> (Client, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = Connection::connect("127.0.0.1", addr.port()).unwrap();
        let (accepted, _) = listener.accept().unwrap();
        (
            Client::new(client, role).with_strategy(HoldStrategy),
            Connection::from_stream(accepted),
        )
    }

    fn player() -> Role {
        Role::Player {
            name: "testbot".to_owned(),
            version: "1.0".to_owned(),
        }
    }

    #[test]
    fn registration_sends_initial_then_name() {
        let (mut client, mut server) = session(player());
        client.register().unwrap();

        let initial = server.recv().unwrap();
        assert_eq!(initial.kind, FrameKind::Initial);
        assert_eq!(initial.payload.as_ref(), &[0x00, 0x01, 0xDA, 0x10]);

        let registration = expect_diplomacy(&mut server);
        assert_eq!(registration.to_string(), "NME ( 'testbot' ) ( '1.0' )");
    }

    #[test]
    fn observer_registers_with_obs() {
        let (mut client, mut server) = session(Role::Observer);
        client.register().unwrap();
        server.recv().unwrap();
        assert_eq!(expect_diplomacy(&mut server).first(), Some(catalog::OBS));
    }

    #[test]
    fn map_without_definition_requests_mdf() {
        let (mut client, mut server) = session(player());
        client.register().unwrap();
        server.recv().unwrap();
        server.recv().unwrap();

        let map = Message::of(catalog::MAP).apply(msg!["standard"].unwrap());
        server.send_frame(FrameKind::Diplomacy, &map.pack()).unwrap();
        server.send_frame(FrameKind::Final, &[]).unwrap();

        assert_eq!(client.run().unwrap(), SessionEnd::ServerClosed);
        assert_eq!(expect_diplomacy(&mut server).to_string(), "MDF");
    }

    // Exercised end to end: MAP, MDF request, MDF, YES(MAP).
    #[test]
    fn mdf_is_answered_with_yes_map() {
        let (mut client, mut server) = session(player());
        client.register().unwrap();
        server.recv().unwrap();
        server.recv().unwrap();

        let map = Message::of(catalog::MAP).apply(msg!["standard"].unwrap());
        server.send_frame(FrameKind::Diplomacy, &map.pack()).unwrap();

        let home_lists = msg![catalog::ENG, catalog::LON].unwrap().wrap().wrap();
        let centers = home_lists.concat(Message::new().wrap()).wrap();
        let adjacencies = Message::of(catalog::LON)
            .concat(msg![catalog::AMY].unwrap().wrap())
            .wrap()
            .wrap();
        let mdf = Message::of(catalog::MDF)
            .concat(msg![catalog::ENG].unwrap().wrap())
            .concat(centers)
            .concat(adjacencies);
        server.send_frame(FrameKind::Diplomacy, &mdf.pack()).unwrap();
        server.send_frame(FrameKind::Final, &[]).unwrap();

        assert_eq!(client.run().unwrap(), SessionEnd::ServerClosed);
        assert_eq!(expect_diplomacy(&mut server).to_string(), "MDF");
        assert_eq!(
            expect_diplomacy(&mut server).to_string(),
            "YES ( MAP ( 'standard' ) )"
        );
        assert!(client.board().is_some());
    }

    #[test]
    fn rejected_registration_is_fatal() {
        let (mut client, mut server) = session(player());
        client.register().unwrap();
        server.recv().unwrap();
        server.recv().unwrap();

        let rej = Message::of(catalog::REJ)
            .apply(Message::of(catalog::NME).apply(msg!["testbot"].unwrap()));
        server.send_frame(FrameKind::Diplomacy, &rej.pack()).unwrap();

        assert!(matches!(
            client.run(),
            Err(ClientError::Protocol(ProtocolError::RegistrationRejected))
        ));
    }

    #[test]
    fn error_frame_surfaces_its_code() {
        let (mut client, mut server) = session(player());
        client.register().unwrap();
        server.recv().unwrap();
        server.recv().unwrap();

        server.send_frame(FrameKind::Error, &[0x00, 0x0A]).unwrap();
        assert!(matches!(
            client.run(),
            Err(ClientError::Protocol(ProtocolError::ErrorMessage(0x000A)))
        ));
    }

    #[test]
    fn undecodable_frames_are_dropped() {
        let (mut client, mut server) = session(player());
        client.register().unwrap();
        server.recv().unwrap();
        server.recv().unwrap();

        // 0x5F00 is in no category; the session must survive it.
        server
            .send_frame(FrameKind::Diplomacy, &[0x5F, 0x00])
            .unwrap();
        server.send_frame(FrameKind::Final, &[]).unwrap();
        assert_eq!(client.run().unwrap(), SessionEnd::ServerClosed);
    }

    #[test]
    fn hlo_records_identity_and_press_level() {
        let (mut client, mut server) = session(player());
        client.register().unwrap();
        server.recv().unwrap();
        server.recv().unwrap();

        let hlo = Message::of(catalog::HLO)
            .apply(Message::of(catalog::ENG))
            .apply(msg![1234].unwrap())
            .apply(msg![catalog::LVL, 10].unwrap().wrap());
        server.send_frame(FrameKind::Diplomacy, &hlo.pack()).unwrap();
        server.send_frame(FrameKind::Final, &[]).unwrap();

        assert_eq!(client.run().unwrap(), SessionEnd::ServerClosed);
        assert_eq!(client.power(), Some(catalog::ENG));
        assert_eq!(client.press_level, 10);
        assert_eq!(client.passcode, Some(1234));
    }

    #[test]
    fn game_end_messages_close_the_session() {
        for end in [catalog::OFF, catalog::DRW, catalog::SLO] {
            let (mut client, mut server) = session(Role::Observer);
            client.register().unwrap();
            server.recv().unwrap();
            server.recv().unwrap();
            server
                .send_frame(FrameKind::Diplomacy, &Message::of(end).pack())
                .unwrap();
            assert_eq!(client.run().unwrap(), SessionEnd::GameOver);
        }
    }

    #[test]
    fn out_only_ends_the_session_for_our_power() {
        let (mut client, mut server) = session(player());
        client.register().unwrap();
        server.recv().unwrap();
        server.recv().unwrap();

        let hlo = Message::of(catalog::HLO)
            .apply(Message::of(catalog::ENG))
            .apply(msg![1].unwrap())
            .apply(Message::new());
        server.send_frame(FrameKind::Diplomacy, &hlo.pack()).unwrap();
        let out_fra = Message::of(catalog::OUT).apply(Message::of(catalog::FRA));
        server
            .send_frame(FrameKind::Diplomacy, &out_fra.pack())
            .unwrap();
        let out_eng = Message::of(catalog::OUT).apply(Message::of(catalog::ENG));
        server
            .send_frame(FrameKind::Diplomacy, &out_eng.pack())
            .unwrap();

        assert_eq!(client.run().unwrap(), SessionEnd::GameOver);
    }

    #[test]
    fn unexpected_inbound_initial_frame_is_a_protocol_error() {
        let (mut client, mut server) = session(player());
        client.register().unwrap();
        server.recv().unwrap();
        server.recv().unwrap();

        server
            .send_frame(FrameKind::Initial, &[0x00, 0x01, 0xDA, 0x10])
            .unwrap();
        assert!(matches!(
            client.run(),
            Err(ClientError::Protocol(ProtocolError::UnexpectedFrame(
                FrameKind::Initial
            )))
        ));
    }
}
