// Playlist model: the two manifest shapes we care about, plus URL helpers.

use m3u8_rs::{MasterPlaylist, MediaPlaylist, VariantStream, parse_playlist_res};
use url::Url;

/// A parsed HLS manifest. Exactly one of the two shapes; callers match exhaustively.
#[derive(Debug, Clone)]
pub enum Playlist {
    Master(MasterPlaylist),
    Media(MediaPlaylist),
}

impl Playlist {
    pub fn kind(&self) -> &'static str {
        match self {
            Playlist::Master(_) => "master",
            Playlist::Media(_) => "media",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to parse playlist: {0}")]
pub struct PlaylistParseError(pub String);

pub fn parse_playlist(bytes: &[u8]) -> Result<Playlist, PlaylistParseError> {
    match parse_playlist_res(bytes) {
        Ok(m3u8_rs::Playlist::MasterPlaylist(pl)) => Ok(Playlist::Master(pl)),
        Ok(m3u8_rs::Playlist::MediaPlaylist(pl)) => Ok(Playlist::Media(pl)),
        Err(e) => Err(PlaylistParseError(e.to_string())),
    }
}

/// First variant whose `VIDEO` group equals `quality`, in manifest order.
pub fn select_variant<'a>(master: &'a MasterPlaylist, quality: &str) -> Option<&'a VariantStream> {
    master
        .variants
        .iter()
        .find(|v| v.video.as_deref() == Some(quality))
}

/// Resolves `uri` against the playlist URL (RFC 3986). An absolute `uri` replaces the
/// base entirely. Either way the result is normalized by the URL parser: scheme and host
/// are lowercased, dot segments removed and unsafe characters percent-encoded.
pub fn resolve_uri(base: &Url, uri: &str) -> Result<Url, url::ParseError> {
    base.join(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID=\"720p60\",NAME=\"720p60\",AUTOSELECT=YES,DEFAULT=YES
#EXT-X-STREAM-INF:BANDWIDTH=3000000,RESOLUTION=1280x720,VIDEO=\"720p60\"
http://edge.example/720p60/index.m3u8
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID=\"chunked\",NAME=\"1080p60 (source)\",AUTOSELECT=YES,DEFAULT=YES
#EXT-X-STREAM-INF:BANDWIDTH=6000000,RESOLUTION=1920x1080,VIDEO=\"chunked\"
http://edge.example/chunked/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=7000000,RESOLUTION=1920x1080,VIDEO=\"chunked\"
http://edge.example/chunked-backup/index.m3u8
";

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:2
#EXT-X-MEDIA-SEQUENCE:100
#EXTINF:2.000,live
a.ts
#EXTINF:2.000,live
http://cdn.example/b.ts
";

    #[test]
    fn parses_both_shapes() {
        assert!(matches!(
            parse_playlist(MASTER.as_bytes()).unwrap(),
            Playlist::Master(_)
        ));
        match parse_playlist(MEDIA.as_bytes()).unwrap() {
            Playlist::Media(pl) => {
                let uris: Vec<_> = pl.segments.iter().map(|s| s.uri.as_str()).collect();
                assert_eq!(uris, ["a.ts", "http://cdn.example/b.ts"]);
            }
            other => panic!("expected media playlist, got {}", other.kind()),
        }
    }

    #[test]
    fn rejects_non_playlist_body() {
        assert!(parse_playlist(b"{\"error\":\"Not Found\"}").is_err());
        assert!(parse_playlist(b"").is_err());
    }

    #[test]
    fn selects_first_matching_variant() {
        let Playlist::Master(master) = parse_playlist(MASTER.as_bytes()).unwrap() else {
            panic!("expected master playlist");
        };
        let variant = select_variant(&master, "chunked").unwrap();
        assert_eq!(variant.uri, "http://edge.example/chunked/index.m3u8");
        assert!(select_variant(&master, "160p30").is_none());
    }

    #[test]
    fn resolves_relative_segment_uri() {
        let base = Url::parse("http://edge.example/live/abc/index.m3u8").unwrap();
        assert_eq!(
            resolve_uri(&base, "seg1.ts").unwrap().as_str(),
            "http://edge.example/live/abc/seg1.ts"
        );
        assert_eq!(
            resolve_uri(&base, "https://other.example/x/seg2.ts")
                .unwrap()
                .as_str(),
            "https://other.example/x/seg2.ts"
        );
        assert_eq!(
            resolve_uri(&base, "HTTPS://Other.Example/x/../y/seg 3.ts")
                .unwrap()
                .as_str(),
            "https://other.example/y/seg%203.ts"
        );
        assert_eq!(
            resolve_uri(&base, "../def/seg4.ts").unwrap().as_str(),
            "http://edge.example/live/def/seg4.ts"
        );
    }
}
