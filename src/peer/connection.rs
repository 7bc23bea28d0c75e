//! Привязка к `webrtc`: конфигурация peer connection и подмена трека
//! на RTP-отправителе без пересогласования.

use crate::config::{CallConfig, ServerConfig};
use crate::error::ReplaceError;
use crate::logger::log;
use crate::media::{LocalTrack, TrackKind, TrackSource};
use crate::signaling::TrackSender;
use crate::utils::{add_ice_url_scheme, random_id};
use async_trait::async_trait;
use std::sync::Arc;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Создает peer connection с аудио/видео кодеками по умолчанию
pub async fn new_media_peer(config: &CallConfig) -> Result<Arc<RTCPeerConnection>, webrtc::Error> {
    let mut media = MediaEngine::default();
    media.register_default_codecs()?;
    let api = APIBuilder::new().with_media_engine(media).build();
    let pc = api.new_peer_connection(rtc_config(&config.ice_servers)).await?;
    Ok(Arc::new(pc))
}

/// Создает конфигурацию для peer connection
pub fn rtc_config(servers: &[ServerConfig]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: get_user_ice_servers(servers),
        ice_candidate_pool_size: 10,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

pub fn get_user_ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}

/// Локальный трек поверх `TrackLocalStaticSample` (VP8 для видео, Opus для звука)
pub fn sample_track(source: TrackSource, stream_id: &str) -> LocalTrack {
    let codec = match source.kind() {
        TrackKind::Video => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            ..Default::default()
        },
        TrackKind::Audio => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            ..Default::default()
        },
    };
    let id = format!("{:?}-{}", source, random_id(4)).to_lowercase();
    let track = Arc::new(TrackLocalStaticSample::new(codec, id, stream_id.to_owned()));
    LocalTrack::bound(source, track, None)
}

fn kind_of(codec: RTPCodecType) -> Option<TrackKind> {
    match codec {
        RTPCodecType::Audio => Some(TrackKind::Audio),
        RTPCodecType::Video => Some(TrackKind::Video),
        _ => None,
    }
}

/// `TrackSender` поверх RTP-отправителя webrtc
pub struct RtcSender {
    sender: Arc<RTCRtpSender>,
    kind: Option<TrackKind>,
}

impl RtcSender {
    pub async fn new(sender: Arc<RTCRtpSender>) -> Self {
        let kind = sender.track().await.and_then(|t| kind_of(t.kind()));
        Self { sender, kind }
    }
}

/// Отправители peer connection в виде `TrackSender`
pub async fn rtc_senders(pc: &RTCPeerConnection) -> Vec<Arc<dyn TrackSender>> {
    let mut out: Vec<Arc<dyn TrackSender>> = Vec::new();
    for sender in pc.get_senders().await {
        out.push(Arc::new(RtcSender::new(sender).await));
    }
    out
}

#[async_trait]
impl TrackSender for RtcSender {
    fn kind(&self) -> Option<TrackKind> {
        self.kind
    }

    async fn replace_track(&self, track: &LocalTrack) -> Result<(), ReplaceError> {
        if self.kind.is_some_and(|k| k != track.kind()) {
            return Err(ReplaceError::KindMismatch);
        }
        let rtc = track.rtc_track().ok_or(ReplaceError::Unbound)?;
        self.sender
            .replace_track(Some(rtc))
            .await
            .map_err(|e| ReplaceError::Transport(e.to_string()))?;
        log(&format!("RTP sender now carries track {}", track.id()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_ice_servers;
    use crate::media::TrackSet;
    use crate::signaling::{replace_on_call, CallSink, MediaCall, PeerId};

    /// Звонок поверх отправителей настоящего peer connection
    struct RtcCall {
        peer: PeerId,
        senders: Vec<Arc<dyn TrackSender>>,
    }

    impl MediaCall for RtcCall {
        fn peer(&self) -> &PeerId {
            &self.peer
        }

        fn answer(&self, _tracks: &TrackSet, _sink: CallSink) {}

        fn senders(&self) -> Vec<Arc<dyn TrackSender>> {
            self.senders.clone()
        }

        fn close(&self) {}
    }

    #[test]
    fn ice_servers_get_schemes_and_credentials() {
        let mut servers = default_ice_servers();
        servers.push(ServerConfig {
            id: "relay".into(),
            r#type: "turn".into(),
            url: "relay.example:3478".into(),
            username: Some("user".into()),
            credential: Some("secret".into()),
        });

        let config = rtc_config(&servers);
        assert_eq!(config.ice_servers.len(), 3);
        assert_eq!(config.ice_servers[2].urls, vec!["turn:relay.example:3478"]);
        assert_eq!(config.ice_servers[2].username, "user");
        assert_eq!(config.ice_servers[0].credential, "");
    }

    #[tokio::test]
    async fn replace_track_keeps_the_same_sender() {
        let pc = new_media_peer(&CallConfig::default()).await.unwrap();
        let camera = sample_track(TrackSource::Camera, "local");
        let rtp = pc.add_track(camera.rtc_track().unwrap()).await.unwrap();

        let senders = rtc_senders(&pc).await;
        assert_eq!(senders.len(), 1);
        assert_eq!(senders[0].kind(), Some(TrackKind::Video));

        let screen = sample_track(TrackSource::Screen, "local");
        senders[0].replace_track(&screen).await.unwrap();
        assert_eq!(rtp.track().await.unwrap().id(), screen.id());
        assert_eq!(pc.get_senders().await.len(), 1);

        let mic = sample_track(TrackSource::Microphone, "local");
        assert_eq!(
            senders[0].replace_track(&mic).await,
            Err(ReplaceError::KindMismatch)
        );
        let unbound = LocalTrack::new("plain", TrackSource::Camera);
        assert_eq!(
            senders[0].replace_track(&unbound).await,
            Err(ReplaceError::Unbound)
        );

        pc.close().await.unwrap();
    }

    #[tokio::test]
    async fn screen_swap_goes_through_rtc_senders_of_a_call() {
        let pc = new_media_peer(&CallConfig::default()).await.unwrap();
        let camera = sample_track(TrackSource::Camera, "local");
        let mic = sample_track(TrackSource::Microphone, "local");
        let video_rtp = pc.add_track(camera.rtc_track().unwrap()).await.unwrap();
        pc.add_track(mic.rtc_track().unwrap()).await.unwrap();

        let call = RtcCall {
            peer: PeerId::new("room"),
            senders: rtc_senders(&pc).await,
        };
        let screen = sample_track(TrackSource::Screen, "local");
        assert_eq!(replace_on_call(&call, &screen).await, Ok(true));
        assert_eq!(video_rtp.track().await.unwrap().id(), screen.id());
        assert_eq!(pc.get_senders().await.len(), 2);

        pc.close().await.unwrap();
    }
}
