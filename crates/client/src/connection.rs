//! Client-seitige TCP-Verbindung zum Plauderstube-Relay
//!
//! Nutzt den FrameCodec aus plauderstube-protocol fuer das Wire-Format
//! (u32 BE length + JSON payload, bei Bildern gefolgt von Rohdaten).
//! Alle Operationen sind async.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use plauderstube_core::{BildGroesse, ChatEreignis, EreignisBeobachter};
use plauderstube_protocol::{Eingang, Envelope, FrameCodec, ImageHeader, Mode, Paket};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use crate::error::{ClientError, ClientResult};

/// Groesster Bild-Rohdatenblock, den der Client annimmt
pub const MAX_BILD_GROESSE: usize = 64 * 1024 * 1024;

// ---------------------------------------------------------------------------
// ChatVerbindung
// ---------------------------------------------------------------------------

/// Angemeldete Verbindung zu einem Relay
pub struct ChatVerbindung<S = TcpStream> {
    /// Framed Stream mit FrameCodec
    framed: Framed<S, FrameCodec>,
    /// Anzeigename, unter dem gesendet wird
    name: String,
}

impl ChatVerbindung<TcpStream> {
    /// Baut eine TCP-Verbindung auf und meldet `name` an
    pub async fn verbinden(addr: impl ToSocketAddrs, name: impl Into<String>) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        tracing::info!(peer = %peer, "TCP-Verbindung hergestellt");
        Self::anmelden(stream, name).await
    }
}

impl<S> ChatVerbindung<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sendet `setup` ueber einen bereits geoeffneten Stream
    pub async fn anmelden(stream: S, name: impl Into<String>) -> ClientResult<Self> {
        let mut verbindung = Self {
            framed: Framed::new(stream, FrameCodec::new()),
            name: name.into(),
        };
        let setup = Envelope::setup(verbindung.name.clone());
        verbindung.senden(&setup).await?;
        tracing::info!(name = %verbindung.name, "Angemeldet");
        Ok(verbindung)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sendet eine Textnachricht
    pub async fn nachricht_senden(&mut self, text: impl Into<String>) -> ClientResult<()> {
        let envelope = Envelope::message(self.name.clone(), text);
        self.senden(&envelope).await
    }

    /// Sendet ein RGBA-Bild
    ///
    /// `pixel` muss genau `breite * hoehe * 4` Bytes lang sein.
    pub async fn bild_senden(&mut self, groesse: BildGroesse, pixel: Bytes) -> ClientResult<()> {
        let erwartet = groesse.erwartete_bytes();
        if pixel.len() as u64 != erwartet {
            return Err(ClientError::UngueltigeBildgroesse {
                groesse,
                erwartet,
                erhalten: pixel.len(),
            });
        }

        let header = ImageHeader::neu(erwartet, groesse);
        let frame = Envelope::image(self.name.clone(), header).encode()?;
        self.framed.send(Paket::mit_nutzlast(frame, pixel)).await?;
        tracing::debug!(groesse = %groesse, "Bild gesendet");
        Ok(())
    }

    /// Wartet auf die naechste Nachricht oder das naechste Bild
    ///
    /// Unbrauchbare Frames und unbekannte Modi werden geloggt und
    /// uebersprungen. `None` wenn der Server die Verbindung geschlossen hat.
    pub async fn empfangen(&mut self) -> ClientResult<Option<ChatEreignis>> {
        loop {
            let frame = match self.framed.next().await {
                Some(Ok(Eingang::Frame(frame))) => frame,
                Some(Ok(Eingang::Rohdaten(_))) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            };

            let envelope = match Envelope::decode(&frame) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!(fehler = %e, "Ungueltiger Frame vom Server ignoriert");
                    continue;
                }
            };

            match &envelope.mode {
                Mode::Message => match envelope.text() {
                    Ok(text) => {
                        return Ok(Some(ChatEreignis::Nachricht {
                            von: envelope.from.clone(),
                            text: text.to_string(),
                        }))
                    }
                    Err(e) => tracing::warn!(fehler = %e, "Ungueltige Nachricht ignoriert"),
                },
                Mode::Image => {
                    if let Some(bild) = self.bild_empfangen(&envelope).await? {
                        return Ok(Some(bild));
                    }
                }
                andere => {
                    tracing::debug!(mode = %andere, from = %envelope.from, "Frame ignoriert");
                }
            }
        }
    }

    /// Liest den Rohdatenblock nach einem `image`-Frame
    async fn bild_empfangen(&mut self, envelope: &Envelope) -> ClientResult<Option<ChatEreignis>> {
        let header = match envelope.image_header() {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!(fehler = %e, "Ungueltiger Bild-Header ignoriert");
                return Ok(None);
            }
        };

        let laenge = usize::try_from(header.length)
            .ok()
            .filter(|laenge| *laenge <= MAX_BILD_GROESSE)
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Bild zu gross: {} Bytes", header.length),
                )
            })?;

        self.framed.codec_mut().rohdaten_erwarten(laenge);
        match self.framed.next().await {
            Some(Ok(Eingang::Rohdaten(daten))) => Ok(Some(ChatEreignis::Bild {
                von: envelope.from.clone(),
                groesse: header.groesse(),
                daten,
            })),
            Some(Ok(Eingang::Frame(_))) => Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Frame statt Bild-Rohdaten gelesen",
            ))),
            Some(Err(e)) => Err(e.into()),
            None => Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Verbindung waehrend Bild-Rohdaten getrennt",
            ))),
        }
    }

    /// Empfangsschleife: meldet jedes Ereignis dem Beobachter bis EOF
    ///
    /// Gibt die Anzahl der gemeldeten Ereignisse zurueck.
    pub async fn weiterleiten(&mut self, beobachter: &dyn EreignisBeobachter) -> ClientResult<usize> {
        let mut anzahl = 0;
        while let Some(ereignis) = self.empfangen().await? {
            beobachter.ereignis(&ereignis);
            anzahl += 1;
        }
        tracing::info!(name = %self.name, anzahl, "Verbindung vom Server geschlossen");
        Ok(anzahl)
    }

    /// Sendet `escape` und schliesst die Verbindung
    pub async fn verlassen(mut self) -> ClientResult<()> {
        let escape = Envelope::escape(self.name.clone());
        self.senden(&escape).await?;
        self.framed.close().await?;
        tracing::info!(name = %self.name, "Chat verlassen");
        Ok(())
    }

    async fn senden(&mut self, envelope: &Envelope) -> ClientResult<()> {
        self.framed.send(Paket::aus_envelope(envelope)?).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
