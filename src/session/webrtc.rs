//! WebRTC peer session manager.
//!
//! Each session is a receive-only audio peer connection. When the peer's
//! data channel and an Opus track are both present, a pipeline runs for
//! that track and its results go back over the data channel.

use super::{PeerSessionManager, SessionError, TrackContext, run_track};
use crate::backend::{RecognitionConfig, TranscriptionBackend};
use crate::config::Config;
use crate::decode::OpusFrameDecoder;
use crate::pipeline::{AudioFrame, PipelineConfig};
use crate::sink::{ResultSink, SinkError};
use crate::source::{FrameSource, IngestError};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MediaEngine};
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_remote::TrackRemote;

/// Per-track settings shared by every session.
#[derive(Debug, Clone)]
pub struct WebRtcSettings {
    pub stun_server: String,
    pub recognition: RecognitionConfig,
    pub pipeline: PipelineConfig,
}

impl WebRtcSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stun_server: config.server.stun_server.clone(),
            recognition: RecognitionConfig::from_config(config),
            pipeline: PipelineConfig::from_config(config),
        }
    }
}

type PeerMap = Arc<Mutex<HashMap<u64, Arc<RTCPeerConnection>>>>;
type ChannelSlot = watch::Receiver<Option<Arc<RTCDataChannel>>>;

fn lock_peers(peers: &PeerMap) -> MutexGuard<'_, HashMap<u64, Arc<RTCPeerConnection>>> {
    peers.lock().unwrap_or_else(|e| e.into_inner())
}

fn peer_error(e: webrtc::Error) -> SessionError {
    SessionError::Peer {
        message: e.to_string(),
    }
}

/// Negotiates peer connections and starts a pipeline per Opus track.
pub struct WebRtcSessionManager<B> {
    api: API,
    backend: Arc<B>,
    settings: WebRtcSettings,
    peers: PeerMap,
    next_id: AtomicU64,
    cancel: CancellationToken,
}

impl<B> WebRtcSessionManager<B>
where
    B: TranscriptionBackend + 'static,
{
    /// Cancelling `cancel` stops every running pipeline.
    pub fn new(
        backend: Arc<B>,
        settings: WebRtcSettings,
        cancel: CancellationToken,
    ) -> Result<Self, SessionError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(peer_error)?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(peer_error)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api,
            backend,
            settings,
            peers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            cancel,
        })
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        let ice_servers = if self.settings.stun_server.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: vec![self.settings.stun_server.clone()],
                ..Default::default()
            }]
        };
        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }

    /// Close every tracked peer connection.
    pub async fn close_all(&self) {
        let peers: Vec<_> = lock_peers(&self.peers).drain().collect();
        for (id, peer) in peers {
            if let Err(e) = peer.close().await {
                warn!(session = id, error = %e, "Failed to close peer connection");
            }
        }
    }

    fn install_handlers(&self, id: u64, peer: &Arc<RTCPeerConnection>) {
        let (channel_tx, channel_rx) = watch::channel(None);

        peer.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
            debug!(session = id, label = channel.label(), "Data channel opened by peer");
            channel_tx.send_if_modified(|slot| {
                if slot.is_none() {
                    *slot = Some(Arc::clone(&channel));
                    true
                } else {
                    false
                }
            });
            Box::pin(async {})
        }));

        let backend = Arc::clone(&self.backend);
        let settings = self.settings.clone();
        let cancel = self.cancel.clone();
        let weak_peer = Arc::downgrade(peer);
        peer.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let mime_type = track.codec().capability.mime_type;
            if mime_type.eq_ignore_ascii_case(MIME_TYPE_OPUS) {
                tokio::spawn(handle_audio_track(
                    track,
                    Arc::clone(&backend),
                    settings.clone(),
                    channel_rx.clone(),
                    weak_peer.clone(),
                    cancel.child_token(),
                ));
            } else {
                debug!(session = id, mime_type = %mime_type, "Ignoring non-Opus track");
            }
            Box::pin(async {})
        }));

        peer.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
            info!(session = id, state = %state, "ICE connection state changed");
            Box::pin(async {})
        }));

        let peers = Arc::clone(&self.peers);
        peer.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            debug!(session = id, state = %state, "Peer connection state changed");
            if matches!(
                state,
                RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed
            ) {
                let removed = lock_peers(&peers).remove(&id);
                if let Some(peer) = removed {
                    tokio::spawn(async move {
                        if let Err(e) = peer.close().await {
                            debug!(session = id, error = %e, "Failed to close peer connection");
                        }
                    });
                }
            }
            Box::pin(async {})
        }));
    }

    async fn negotiate(
        &self,
        peer: &RTCPeerConnection,
        offer: String,
    ) -> Result<String, SessionError> {
        peer.add_transceiver_from_kind(
            RTPCodecType::Audio,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: Vec::new(),
            }),
        )
        .await
        .map_err(peer_error)?;

        let offer = RTCSessionDescription::offer(offer).map_err(|e| SessionError::InvalidOffer {
            message: e.to_string(),
        })?;
        peer.set_remote_description(offer)
            .await
            .map_err(|e| SessionError::InvalidOffer {
                message: e.to_string(),
            })?;

        let answer = peer.create_answer(None).await.map_err(peer_error)?;
        let mut gathered = peer.gathering_complete_promise().await;
        peer.set_local_description(answer)
            .await
            .map_err(peer_error)?;
        // Non-trickle: the answer carries every candidate
        if gathered.recv().await.is_none() {
            debug!("ICE gathering ended without completion signal");
        }

        peer.local_description()
            .await
            .map(|description| description.sdp)
            .ok_or_else(|| SessionError::Peer {
                message: "no local description after negotiation".to_string(),
            })
    }
}

#[async_trait::async_trait]
impl<B> PeerSessionManager for WebRtcSessionManager<B>
where
    B: TranscriptionBackend + 'static,
{
    async fn create_session(&self, offer: String) -> Result<String, SessionError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let peer = Arc::new(
            self.api
                .new_peer_connection(self.rtc_configuration())
                .await
                .map_err(peer_error)?,
        );
        self.install_handlers(id, &peer);

        match self.negotiate(&peer, offer).await {
            Ok(answer) => {
                lock_peers(&self.peers).insert(id, peer);
                info!(session = id, "Session created");
                Ok(answer)
            }
            Err(error) => {
                if let Err(e) = peer.close().await {
                    debug!(session = id, error = %e, "Failed to close rejected peer connection");
                }
                Err(error)
            }
        }
    }

    fn active_sessions(&self) -> usize {
        lock_peers(&self.peers).len()
    }
}

async fn handle_audio_track<B>(
    track: Arc<TrackRemote>,
    backend: Arc<B>,
    settings: WebRtcSettings,
    mut channels: ChannelSlot,
    peer: Weak<RTCPeerConnection>,
    cancel: CancellationToken,
) where
    B: TranscriptionBackend + 'static,
{
    let track_id = track.id();
    info!(track_id = %track_id, "Received Opus track");

    // The peer opens the results channel; wait for it as long as for the first frame
    let channel = tokio::select! {
        _ = cancel.cancelled() => None,
        found = tokio::time::timeout(
            settings.pipeline.first_frame_timeout,
            wait_for_channel(&mut channels),
        ) => found.ok().flatten(),
    };

    let Some(channel) = channel else {
        warn!(track_id = %track_id, "No data channel from peer, dropping track");
        close_peer(&peer).await;
        return;
    };

    let decoder = match OpusFrameDecoder::new() {
        Ok(decoder) => decoder,
        Err(e) => {
            warn!(track_id = %track_id, error = %e, "Failed to create Opus decoder");
            close_peer(&peer).await;
            return;
        }
    };

    let mut sink = DataChannelSink::new(channel);
    let report = run_track(
        TrackContext {
            track_id: &track_id,
            backend: backend.as_ref(),
            recognition: &settings.recognition,
            pipeline: settings.pipeline,
            cancel,
        },
        decoder,
        TrackFrameSource::new(track),
        &mut sink,
    )
    .await;

    if let Some(error) = &report.pipeline.error {
        warn!(track_id = %track_id, error = %error, "Error reading track");
    }
    close_peer(&peer).await;
}

/// Resolves once the peer's data channel is known, or `None` if the
/// session went away first.
async fn wait_for_channel(channels: &mut ChannelSlot) -> Option<Arc<RTCDataChannel>> {
    loop {
        if let Some(channel) = channels.borrow_and_update().clone() {
            return Some(channel);
        }
        if channels.changed().await.is_err() {
            return None;
        }
    }
}

async fn close_peer(peer: &Weak<RTCPeerConnection>) {
    if let Some(peer) = peer.upgrade() {
        if let Err(e) = peer.close().await {
            debug!(error = %e, "Failed to close peer connection");
        }
    }
}

/// Reads RTP payloads for a [`TrackFrameSource`].
#[async_trait::async_trait]
pub trait PacketReader: Send {
    async fn read_payload(&mut self) -> Result<Vec<u8>, webrtc::Error>;
}

#[async_trait::async_trait]
impl PacketReader for Arc<TrackRemote> {
    async fn read_payload(&mut self) -> Result<Vec<u8>, webrtc::Error> {
        let (packet, _attributes) = self.read_rtp().await?;
        Ok(packet.payload.to_vec())
    }
}

/// Frames from a remote RTP track.
pub struct TrackFrameSource<R = Arc<TrackRemote>> {
    reader: R,
    sequence: u64,
}

impl<R: PacketReader> TrackFrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, sequence: 0 }
    }
}

/// Whether a read error means the track ended normally.
///
/// A stopped receiver reports a closed pipe; a drained interceptor buffer
/// reports a closed buffer. Everything else is a hard error.
fn is_end_of_track(error: &webrtc::Error) -> bool {
    matches!(
        error,
        webrtc::Error::ErrClosedPipe
            | webrtc::Error::Util(webrtc::util::Error::ErrBufferClosed)
    )
}

#[async_trait::async_trait]
impl<R: PacketReader> FrameSource for TrackFrameSource<R> {
    async fn next_frame(&mut self) -> Result<Option<AudioFrame>, IngestError> {
        match self.reader.read_payload().await {
            Ok(payload) => {
                let frame = AudioFrame::new(payload, self.sequence);
                self.sequence += 1;
                Ok(Some(frame))
            }
            Err(e) if is_end_of_track(&e) => Ok(None),
            Err(e) => Err(IngestError::new(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "rtp"
    }
}

/// Results over the peer's data channel.
pub struct DataChannelSink {
    channel: Arc<RTCDataChannel>,
}

impl DataChannelSink {
    pub fn new(channel: Arc<RTCDataChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait::async_trait]
impl ResultSink for DataChannelSink {
    async fn send(&mut self, message: &[u8]) -> Result<(), SinkError> {
        self.channel
            .send(&Bytes::copy_from_slice(message))
            .await
            .map(|_| ())
            .map_err(|e| SinkError::Send {
                message: e.to_string(),
            })
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.channel.close().await.map_err(|e| SinkError::Send {
            message: e.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "data_channel"
    }
}
