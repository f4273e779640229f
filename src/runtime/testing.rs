//! Mock implementations for testing
//!
//! These mocks enable dispatcher testing without real I/O.

use super::{DispatchOutcome, Dispatcher};
use crate::config::ReminderSettings;
use crate::media::{extension_for, MediaError, MediaFolder, MediaResult, MediaStorage};
use crate::playlist::Playlist;
use crate::qr::{DecodeError, QrDecoder};
use crate::registry::{Guest, GuestRegistry, RegistryError, RegistryResult};
use crate::roster::AdminRosters;
use crate::session::SessionRepository;
use crate::state_machine::{ConversationState, Features};
use crate::store::{KeySpace, MemoryStore};
use crate::transport::{
    InboundMessage, MediaAttachment, OutboundMessage, Transport, TransportError, TransportResult,
};
use async_trait::async_trait;
use image::{GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SEED_ADMIN: &str = "+62800000000";

// ============================================================================
// Mock Guest Registry
// ============================================================================

#[derive(Default)]
pub struct MockRegistry {
    guests: Mutex<HashMap<String, Guest>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, guest: Guest) {
        self.guests.lock().unwrap().insert(guest.id.clone(), guest);
    }

    pub fn guest(&self, id: &str) -> Option<Guest> {
        self.guests.lock().unwrap().get(id).cloned()
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool) -> RegistryResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("mock registry offline".to_string()));
        }
        Ok(())
    }

    fn mutate(&self, id: &str, apply: impl FnOnce(&mut Guest)) -> RegistryResult<()> {
        self.check(&self.fail_writes)?;
        let mut guests = self.guests.lock().unwrap();
        let guest = guests
            .get_mut(id)
            .ok_or_else(|| RegistryError::GuestNotFound(id.to_string()))?;
        apply(guest);
        Ok(())
    }
}

#[async_trait]
impl GuestRegistry for MockRegistry {
    async fn find_by_phone(&self, phone_number: &str) -> RegistryResult<Option<Guest>> {
        self.check(&self.fail_reads)?;
        Ok(self
            .guests
            .lock()
            .unwrap()
            .values()
            .find(|g| g.phone_number == phone_number)
            .cloned())
    }

    async fn find_by_id(&self, guest_id: &str) -> RegistryResult<Option<Guest>> {
        self.check(&self.fail_reads)?;
        Ok(self.guest(guest_id))
    }

    async fn update_headcount(&self, guest_id: &str, headcount: u32) -> RegistryResult<()> {
        self.mutate(guest_id, |g| g.headcount = headcount)
    }

    async fn set_attendance_confirmed(&self, guest_id: &str) -> RegistryResult<()> {
        self.mutate(guest_id, |g| g.attendance_confirmed = true)
    }

    async fn list_phone_numbers(&self) -> RegistryResult<Vec<String>> {
        self.check(&self.fail_reads)?;
        let mut guests: Vec<Guest> = self.guests.lock().unwrap().values().cloned().collect();
        guests.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(guests.into_iter().map(|g| g.phone_number).collect())
    }
}

// ============================================================================
// Mock Transport
// ============================================================================

/// Records successful sends; configured recipients fail
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: Mutex<HashSet<String>>,
    fail_downloads: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends_to(&self, recipient: &str) {
        self.failing.lock().unwrap().insert(recipient.to_string());
    }

    pub fn fail_downloads(&self) {
        self.fail_downloads.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|m| m.recipient().to_string())
            .collect()
    }

    /// Text bodies delivered to one recipient
    pub fn texts_to(&self, recipient: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::Text { to, text } if to == recipient => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, message: &OutboundMessage) -> TransportResult<()> {
        if self.failing.lock().unwrap().contains(message.recipient()) {
            return Err(TransportError::Send {
                recipient: message.recipient().to_string(),
                reason: "mock failure".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn download(&self, attachment: &MediaAttachment) -> TransportResult<Vec<u8>> {
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(TransportError::Download("mock download failure".to_string()));
        }
        attachment
            .inline_bytes()
            .unwrap_or_else(|| Err(TransportError::Download("no inline data".to_string())))
    }
}

// ============================================================================
// Mock Media Storage
// ============================================================================

#[derive(Default)]
pub struct MockMediaStorage {
    files: Mutex<HashMap<(&'static str, String), Vec<u8>>>,
    saved: Mutex<Vec<(MediaFolder, String)>>,
    fail_saves: AtomicBool,
}

impl MockMediaStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, folder: MediaFolder, file_name: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert((folder.dir_name(), file_name.to_string()), data.to_vec());
    }

    pub fn saved(&self) -> Vec<(MediaFolder, String)> {
        self.saved.lock().unwrap().clone()
    }

    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaStorage for MockMediaStorage {
    async fn save(&self, folder: MediaFolder, mime_type: &str, data: &[u8]) -> MediaResult<String> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(MediaError::Io(std::io::Error::other("mock disk full")));
        }
        let mut saved = self.saved.lock().unwrap();
        let file_name = format!("upload-{}.{}", saved.len(), extension_for(mime_type));
        self.insert(folder, &file_name, data);
        saved.push((folder, file_name.clone()));
        Ok(file_name)
    }

    async fn load(&self, folder: MediaFolder, file_name: &str) -> MediaResult<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(&(folder.dir_name(), file_name.to_string()))
            .cloned()
            .ok_or_else(|| MediaError::NotFound(file_name.to_string()))
    }
}

// ============================================================================
// Stub QR Decoder
// ============================================================================

/// Maps exact image bytes to payloads; anything else has no symbol
#[derive(Default, Clone)]
pub struct StubDecoder {
    payloads: HashMap<Vec<u8>, String>,
}

impl StubDecoder {
    pub fn with_payload(mut self, image: &[u8], payload: &str) -> Self {
        self.payloads.insert(image.to_vec(), payload.to_string());
        self
    }
}

impl QrDecoder for StubDecoder {
    fn decode(&self, image_bytes: &[u8]) -> Result<String, DecodeError> {
        self.payloads
            .get(image_bytes)
            .cloned()
            .ok_or(DecodeError::NoSymbol)
    }
}

/// Render `payload` as a QR code, 8 pixels per module with a 4 module quiet zone
pub fn render_qr(payload: &str) -> GrayImage {
    const SCALE: usize = 8;
    const QUIET: usize = 4;

    let code = QrCode::new(payload.as_bytes()).unwrap();
    let width = code.width();
    let colors = code.to_colors();
    let side = u32::try_from((width + 2 * QUIET) * SCALE).unwrap();

    GrayImage::from_fn(side, side, |x, y| {
        let module = |px: u32| {
            (px as usize / SCALE)
                .checked_sub(QUIET)
                .filter(|m| *m < width)
        };
        match (module(x), module(y)) {
            (Some(mx), Some(my)) if colors[my * width + mx] == Color::Dark => Luma([0]),
            _ => Luma([255]),
        }
    })
}

pub fn encode_image(image: &GrayImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

// ============================================================================
// Test Engine
// ============================================================================

/// A dispatcher wired to mocks and an in-memory store
pub struct TestEngine {
    pub dispatcher: Dispatcher,
    pub registry: Arc<MockRegistry>,
    pub transport: Arc<MockTransport>,
    pub media: Arc<MockMediaStorage>,
    pub store: Arc<MemoryStore>,
    pub sessions: SessionRepository,
    pub rosters: Arc<AdminRosters>,
    pub playlist: Arc<Playlist>,
}

impl TestEngine {
    pub fn builder() -> TestEngineBuilder {
        TestEngineBuilder::default()
    }

    pub async fn text(&self, sender: &str, text: &str) -> DispatchOutcome {
        self.dispatcher
            .handle(InboundMessage::text(sender, text))
            .await
    }

    pub async fn image(&self, sender: &str, bytes: &[u8]) -> DispatchOutcome {
        self.dispatcher
            .handle(InboundMessage::image(
                sender,
                MediaAttachment::inline("image/jpeg", bytes),
            ))
            .await
    }

    pub async fn state_of(&self, guest_id: &str) -> ConversationState {
        self.sessions.load(guest_id).await.unwrap()
    }

    /// Let detached jobs run to completion. Needs a paused clock.
    pub async fn drain_background(&self) {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}

/// Text bodies of the replies in an outcome
pub fn reply_texts(outcome: &DispatchOutcome) -> Vec<&str> {
    outcome
        .replies
        .iter()
        .filter(|m| matches!(m, OutboundMessage::Text { .. }))
        .map(OutboundMessage::body)
        .collect()
}

pub struct TestEngineBuilder {
    guests: Vec<Guest>,
    features: Features,
    stub: StubDecoder,
    decoder: Option<Arc<dyn QrDecoder>>,
    injections: HashMap<String, String>,
    playlist: Vec<String>,
    reminder: ReminderSettings,
}

impl Default for TestEngineBuilder {
    fn default() -> Self {
        Self {
            guests: vec![],
            features: Features::default(),
            stub: StubDecoder::default(),
            decoder: None,
            injections: HashMap::new(),
            playlist: vec!["1.mp4".to_string(), "2.mp4".to_string()],
            reminder: ReminderSettings {
                pacing: Duration::ZERO,
                ..ReminderSettings::default()
            },
        }
    }
}

impl TestEngineBuilder {
    pub fn guest(mut self, guest: Guest) -> Self {
        self.guests.push(guest);
        self
    }

    pub fn features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn qr_payload(mut self, image: &[u8], payload: &str) -> Self {
        self.stub = self.stub.with_payload(image, payload);
        self
    }

    /// Replace the stub with a real decoder
    pub fn decoder(mut self, decoder: impl QrDecoder + 'static) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    pub fn reminder_pacing(mut self, pacing: Duration) -> Self {
        self.reminder.pacing = pacing;
        self
    }

    pub fn injection(mut self, guest_id: &str, url: &str) -> Self {
        self.injections
            .insert(guest_id.to_string(), url.to_string());
        self
    }

    pub fn build(self) -> TestEngine {
        let registry = Arc::new(MockRegistry::new());
        for guest in self.guests {
            registry.insert(guest);
        }
        let transport = Arc::new(MockTransport::new());
        let media = Arc::new(MockMediaStorage::new());
        let store = Arc::new(MemoryStore::new());
        let keys = KeySpace::new("test");

        let sessions =
            SessionRepository::new(store.clone(), keys.clone(), Duration::from_secs(60));
        let rosters = Arc::new(AdminRosters::new(
            store.clone(),
            keys.clone(),
            Duration::from_secs(36_000),
            vec![SEED_ADMIN.to_string()],
        ));
        let playlist = Arc::new(Playlist::new(
            store.clone(),
            keys,
            Duration::from_secs(600),
            self.playlist,
            self.injections,
        ));

        let dispatcher = Dispatcher::new(
            registry.clone(),
            transport.clone(),
            media.clone(),
            self.decoder.unwrap_or_else(|| Arc::new(self.stub)),
            sessions.clone(),
            rosters.clone(),
            playlist.clone(),
            self.features,
            self.reminder,
        );

        TestEngine {
            dispatcher,
            registry,
            transport,
            media,
            store,
            sessions,
            rosters,
            playlist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qr::RqrrDecoder;
    use crate::registry::AttendanceTier;
    use crate::runtime::EngineError;
    use crate::state_machine::{replies, Checkpoint};

    const G1_PHONE: &str = "+6281100001";
    const G1_JID: &str = "6281100001@s.whatsapp.net";
    const ADMIN_PHONE: &str = "+6281100009";

    fn g1() -> Guest {
        Guest::new("g-1", G1_PHONE, "Bapak Agus")
            .with_headcount(2)
            .with_qr_image("qr-g-1.png")
    }

    fn admin() -> Guest {
        Guest::new("g-admin", ADMIN_PHONE, "Panitia")
    }

    fn engine() -> TestEngine {
        TestEngine::builder().guest(g1()).guest(admin()).build()
    }

    #[tokio::test]
    async fn test_unregistered_number_gets_fixed_reply_and_no_session() {
        let engine = engine();
        let outcome = engine.text("+62999", "halo").await;

        assert_eq!(reply_texts(&outcome), vec![replies::NOT_REGISTERED]);
        assert!(matches!(outcome.error, Some(EngineError::NotRegistered(_))));
        assert_eq!(engine.transport.sent().len(), 1);
        assert_eq!(engine.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_self_sent_echoes_are_ignored() {
        let engine = engine();
        let outcome = engine
            .dispatcher
            .handle(InboundMessage {
                from_me: true,
                ..InboundMessage::text(G1_JID, "1")
            })
            .await;
        assert!(outcome.replies.is_empty());
        assert!(engine.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_headcount_change_scenario() {
        let engine = engine();

        let outcome = engine.text(G1_JID, "1").await;
        assert_eq!(reply_texts(&outcome), vec![replies::PROMPT_HEADCOUNT]);
        assert_eq!(
            engine.state_of("g-1").await,
            ConversationState::AwaitingRsvpCount
        );

        let outcome = engine.text(G1_JID, "5").await;
        assert!(outcome.error.is_none());
        assert_eq!(engine.registry.guest("g-1").unwrap().headcount, 5);
        assert_eq!(
            reply_texts(&outcome),
            vec![replies::rsvp_updated("Bapak Agus", 5)]
        );
        assert_eq!(engine.state_of("g-1").await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn test_non_numeric_headcount_reprompts() {
        let engine = engine();
        engine.text(G1_JID, "1").await;
        for _ in 0..2 {
            let outcome = engine.text(G1_JID, "lima").await;
            assert_eq!(reply_texts(&outcome), vec![replies::REPROMPT_HEADCOUNT]);
            assert_eq!(
                engine.state_of("g-1").await,
                ConversationState::AwaitingRsvpCount
            );
        }
        assert_eq!(engine.registry.guest("g-1").unwrap().headcount, 2);
    }

    #[tokio::test]
    async fn test_registry_failure_keeps_state() {
        let engine = engine();
        engine.text(G1_JID, "1").await;
        engine.registry.fail_writes();

        let outcome = engine.text(G1_JID, "4").await;
        assert_eq!(reply_texts(&outcome), vec![replies::GENERIC_ERROR]);
        assert!(matches!(outcome.error, Some(EngineError::Registry(_))));
        assert_eq!(
            engine.state_of("g-1").await,
            ConversationState::AwaitingRsvpCount
        );
    }

    #[tokio::test]
    async fn test_zero_cancels_every_waiting_state() {
        let engine = TestEngine::builder()
            .guest(g1())
            .features(Features {
                operations_commands: true,
                broadcast_mode: false,
            })
            .build();

        for (command, cancelled) in [
            ("1", replies::CANCELLED_HEADCOUNT),
            ("23", replies::CANCELLED_MEDIA),
            ("1819", replies::CANCELLED_QR),
            ("Konfirmasi QR 1", replies::CANCELLED_QR),
            ("Konfirmasi QR 2", replies::CANCELLED_QR),
        ] {
            engine.text(G1_JID, command).await;
            assert_ne!(engine.state_of("g-1").await, ConversationState::Idle);

            let outcome = engine.text(G1_JID, "0").await;
            assert_eq!(reply_texts(&outcome), vec![cancelled], "after {command:?}");
            assert_eq!(engine.state_of("g-1").await, ConversationState::Idle);
        }
    }

    #[tokio::test]
    async fn test_unknown_idle_text_gets_help() {
        let engine = engine();
        let outcome = engine.text(G1_JID, "apa kabar").await;
        assert_eq!(reply_texts(&outcome), vec![replies::HELP]);
        assert!(matches!(outcome.error, Some(EngineError::UnrecognizedInput)));
        assert_eq!(engine.state_of("g-1").await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn test_empty_message_in_idle_is_technical_error() {
        let engine = engine();
        let outcome = engine.image(G1_JID, b"random").await;
        assert_eq!(reply_texts(&outcome), vec![replies::TECHNICAL_ERROR]);
        assert!(matches!(outcome.error, Some(EngineError::UnreadableMessage)));
    }

    #[tokio::test]
    async fn test_summary_and_qr_ticket() {
        let engine = engine();
        engine
            .media
            .insert(MediaFolder::QrCodes, "qr-g-1.png", b"ticket");

        let outcome = engine.text(G1_JID, "2").await;
        assert!(reply_texts(&outcome)[0].contains("Bapak Agus"));

        let outcome = engine.text(G1_JID, "3").await;
        assert_eq!(outcome.replies.len(), 2);
        assert!(matches!(
            &outcome.replies[1],
            OutboundMessage::Media { payload, caption, .. }
                if payload.data == b"ticket" && caption == replies::QR_CAPTION
        ));
    }

    #[tokio::test]
    async fn test_missing_qr_ticket_reports_failure() {
        let engine = engine();
        let outcome = engine.text(G1_JID, "3").await;
        assert_eq!(
            reply_texts(&outcome),
            vec![replies::QR_INTRO, replies::QR_SEND_FAILED]
        );
        assert!(matches!(outcome.error, Some(EngineError::Media(_))));
    }

    #[tokio::test]
    async fn test_media_upload_scenario() {
        let engine = engine();
        engine.text(G1_JID, "23").await;

        let outcome = engine
            .dispatcher
            .handle(InboundMessage::video(
                G1_JID,
                MediaAttachment::inline("video/mp4", b"frames"),
            ))
            .await;
        assert_eq!(
            reply_texts(&outcome),
            vec!["Terima kasih. Video Ucapan anda telah berhasil disimpan"]
        );
        assert_eq!(engine.media.saved().len(), 1);
        assert_eq!(engine.media.saved()[0].0, MediaFolder::Videos);
        assert_eq!(engine.state_of("g-1").await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn test_media_download_failure_keeps_state() {
        let engine = engine();
        engine.text(G1_JID, "23").await;
        engine.transport.fail_downloads();

        let outcome = engine.image(G1_JID, b"photo").await;
        assert_eq!(reply_texts(&outcome), vec![replies::MEDIA_DOWNLOAD_FAILED]);
        assert!(matches!(outcome.error, Some(EngineError::Transport(_))));
        assert_eq!(
            engine.state_of("g-1").await,
            ConversationState::AwaitingMediaUpload
        );
    }

    #[tokio::test]
    async fn test_unknown_guest_qr_keeps_checkpoint_state() {
        let engine = TestEngine::builder()
            .guest(admin())
            .qr_payload(b"qr-ghost", "ghost-id")
            .build();

        engine.text(ADMIN_PHONE, "Konfirmasi QR 1").await;
        let outcome = engine.image(ADMIN_PHONE, b"qr-ghost").await;

        assert_eq!(reply_texts(&outcome), vec![replies::QR_INVALID]);
        assert!(matches!(outcome.error, Some(EngineError::InvalidSymbol(_))));
        assert_eq!(
            engine.state_of("g-admin").await,
            ConversationState::AwaitingQrCodeCheckpointA
        );
    }

    #[tokio::test]
    async fn test_unreadable_qr_keeps_state() {
        let engine = engine();
        engine.text(ADMIN_PHONE, "Konfirmasi QR 2").await;
        let outcome = engine.image(ADMIN_PHONE, b"blurry").await;
        assert_eq!(reply_texts(&outcome), vec![replies::QR_INVALID]);
        assert_eq!(
            engine.state_of("g-admin").await,
            ConversationState::AwaitingQrCodeCheckpointB
        );
    }

    #[tokio::test]
    async fn test_checkpoint_check_in_scenario() {
        let engine = TestEngine::builder()
            .guest(g1().with_tier(AttendanceTier::Vip))
            .guest(admin())
            .qr_payload(b"qr-g-1", " g-1\n")
            .injection("g-1", "agus.mp4")
            .build();

        engine.text(ADMIN_PHONE, "AT 2").await;
        engine.text(ADMIN_PHONE, "Konfirmasi QR 2").await;
        let outcome = engine.image(ADMIN_PHONE, b"qr-g-1").await;

        assert!(outcome.error.is_none(), "{:?}", outcome.error);
        assert_eq!(reply_texts(&outcome), vec!["Selamat datang, Bapak Agus"]);
        assert!(engine.registry.guest("g-1").unwrap().attendance_confirmed);
        assert_eq!(engine.state_of("g-admin").await, ConversationState::Idle);

        // Every roster B member hears about it
        for member in [SEED_ADMIN, ADMIN_PHONE] {
            let notices = engine.transport.texts_to(member);
            let notice = notices.last().unwrap();
            assert!(notice.starts_with("Konfirmasi Kehadiran Berhasil!"));
            assert!(notice.contains("Nama: Bapak Agus"));
            assert!(notice.contains("VIP: true"));
        }

        // The guest's media is next on screen
        let snapshot = engine.playlist.advance().await.unwrap();
        assert_eq!(snapshot.current_url.as_deref(), Some("agus.mp4"));
    }

    #[tokio::test]
    async fn test_generic_check_in_notifies_nobody() {
        let engine = TestEngine::builder()
            .guest(g1())
            .guest(admin())
            .features(Features {
                operations_commands: true,
                broadcast_mode: false,
            })
            .qr_payload(b"qr-g-1", "g-1")
            .build();

        engine.text(ADMIN_PHONE, "1819").await;
        engine.image(ADMIN_PHONE, b"qr-g-1").await;

        assert!(engine.registry.guest("g-1").unwrap().attendance_confirmed);
        assert!(engine.transport.texts_to(SEED_ADMIN).is_empty());
    }

    #[tokio::test]
    async fn test_joining_roster_twice_keeps_one_entry() {
        let engine = engine();
        engine.text(ADMIN_PHONE, "AT 1").await;
        let outcome = engine.text(ADMIN_PHONE, "AT 1").await;

        let members = engine.rosters.members(Checkpoint::A).await.unwrap();
        assert_eq!(members.iter().filter(|m| *m == ADMIN_PHONE).count(), 1);
        assert_eq!(
            reply_texts(&outcome),
            vec![format!(
                "Anda sudah terdaftar menjadi bagian dari AT 1, {SEED_ADMIN},{ADMIN_PHONE}"
            )]
        );
    }

    #[tokio::test]
    async fn test_nat_leaves_both_rosters() {
        let engine = engine();
        engine.text(ADMIN_PHONE, "AT 1").await;
        engine.text(ADMIN_PHONE, "AT 2").await;
        let outcome = engine.text(ADMIN_PHONE, "NAT").await;

        assert_eq!(reply_texts(&outcome), vec![replies::ROSTERS_LEFT]);
        for checkpoint in Checkpoint::ALL {
            let members = engine.rosters.members(checkpoint).await.unwrap();
            assert!(!members.iter().any(|m| m == ADMIN_PHONE));
        }
    }

    #[tokio::test]
    async fn test_concurrent_roster_joins_are_not_lost() {
        let mut builder = TestEngine::builder();
        for i in 0..10 {
            builder = builder.guest(Guest::new(
                format!("g-{i}"),
                format!("+6290{i}"),
                format!("Panitia {i}"),
            ));
        }
        let engine = Arc::new(builder.build());

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.text(&format!("+6290{i}"), "AT 1").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let members = engine.rosters.members(Checkpoint::A).await.unwrap();
        assert_eq!(members.len(), 11);
    }

    #[tokio::test]
    async fn test_operations_commands_need_flag() {
        let engine = engine();
        let outcome = engine.text(G1_JID, "2306").await;
        assert_eq!(reply_texts(&outcome), vec![replies::HELP]);

        let engine = TestEngine::builder()
            .guest(g1())
            .features(Features {
                operations_commands: true,
                broadcast_mode: false,
            })
            .build();
        engine.playlist.advance().await.unwrap();
        let outcome = engine.text(G1_JID, "2306").await;
        assert_eq!(reply_texts(&outcome), vec![replies::PLAYLIST_RESET]);
        assert_eq!(engine.playlist.advance().await.unwrap().current_index, 0);
    }

    fn broadcast_engine(pacing: Duration) -> TestEngine {
        TestEngine::builder()
            .guest(g1())
            .guest(admin())
            .features(Features {
                operations_commands: false,
                broadcast_mode: true,
            })
            .reminder_pacing(pacing)
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reminder_broadcast_reports_counts() {
        let engine = broadcast_engine(Duration::ZERO);
        engine.transport.fail_sends_to(G1_PHONE);

        let outcome = engine.text(ADMIN_PHONE, "Broadcast Reminder Ucapans").await;
        assert_eq!(reply_texts(&outcome), vec![replies::BROADCAST_STARTED]);

        engine.drain_background().await;
        assert_eq!(
            engine.transport.texts_to(ADMIN_PHONE).last(),
            Some(&replies::broadcast_summary(1, 1))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reminder_broadcast_does_not_hold_the_request() {
        let pacing = Duration::from_secs(5);
        let engine = broadcast_engine(pacing);

        let started = tokio::time::Instant::now();
        let outcome = engine.text(ADMIN_PHONE, "Broadcast Reminder Ucapans").await;
        assert!(started.elapsed() < pacing);
        assert_eq!(reply_texts(&outcome), vec![replies::BROADCAST_STARTED]);

        // The operator is free to use other commands meanwhile
        let outcome = engine.text(ADMIN_PHONE, "2").await;
        assert!(reply_texts(&outcome)[0].starts_with("Berikut ini rekap"));

        // A repeated trigger while running does not start a second round
        let outcome = engine.text(ADMIN_PHONE, "Broadcast Reminder Ucapans").await;
        assert_eq!(reply_texts(&outcome), vec![replies::BROADCAST_IN_PROGRESS]);

        engine.drain_background().await;
        let summaries: Vec<String> = engine
            .transport
            .texts_to(ADMIN_PHONE)
            .into_iter()
            .filter(|t| t.starts_with("Broadcast selesai"))
            .collect();
        assert_eq!(summaries, vec![replies::broadcast_summary(2, 0)]);

        // Finished, so the next trigger starts again
        let outcome = engine.text(ADMIN_PHONE, "Broadcast Reminder Ucapans").await;
        assert_eq!(reply_texts(&outcome), vec![replies::BROADCAST_STARTED]);
    }

    #[tokio::test]
    async fn test_check_in_with_real_qr_decoder() {
        let engine = TestEngine::builder()
            .guest(g1())
            .guest(admin())
            .decoder(RqrrDecoder)
            .build();
        let ticket = encode_image(&render_qr("g-1"), ImageFormat::Png);

        engine.text(ADMIN_PHONE, "Konfirmasi QR 1").await;
        let outcome = engine.image(ADMIN_PHONE, &ticket).await;

        assert!(outcome.error.is_none(), "{:?}", outcome.error);
        assert_eq!(reply_texts(&outcome), vec!["Selamat datang, Bapak Agus"]);
        assert!(engine.registry.guest("g-1").unwrap().attendance_confirmed);
        assert_eq!(engine.state_of("g-admin").await, ConversationState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_cancels_silently() {
        let engine = engine();
        engine.text(G1_JID, "1").await;
        tokio::time::advance(Duration::from_secs(61)).await;

        let outcome = engine.text(G1_JID, "5").await;
        assert_eq!(reply_texts(&outcome), vec![replies::HELP]);
        assert_eq!(engine.registry.guest("g-1").unwrap().headcount, 2);
    }

    #[tokio::test]
    async fn test_quoted_text_fallback_dispatches_command() {
        let engine = engine();
        let outcome = engine
            .dispatcher
            .handle(InboundMessage {
                sender: G1_JID.to_string(),
                text: Some(String::new()),
                quoted_text: Some("2".to_string()),
                ..InboundMessage::default()
            })
            .await;
        assert!(reply_texts(&outcome)[0].starts_with("Berikut ini rekap"));
    }
}
