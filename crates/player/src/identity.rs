//! Who we are and which session we want to be in.

use url::Url;
use wordgrid_shared::{JoinMode, PlayerId, SessionCode, SessionCodeError};

/// Everything the join screen collects.
///
/// The connection is only wanted once every field is usable and the player
/// has left the join screen; see [`JoinIntent::connect_params`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinIntent {
    pub code: String,
    pub player_id: Option<PlayerId>,
    pub name: String,
    pub avatar: Option<String>,
    pub mode: JoinMode,
    pub on_join_screen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotConnectable {
    #[error("still on the join screen")]
    OnJoinScreen,
    #[error("invalid session code: {0}")]
    InvalidCode(#[from] SessionCodeError),
    #[error("no player id")]
    MissingPlayerId,
    #[error("no display name chosen")]
    MissingName,
    #[error("no avatar chosen")]
    MissingAvatar,
}

impl JoinIntent {
    /// Validate the intent into the parameters of one session connection.
    pub fn connect_params(&self) -> Result<ConnectParams, NotConnectable> {
        if self.on_join_screen {
            return Err(NotConnectable::OnJoinScreen);
        }
        let code = SessionCode::parse(&self.code)?;
        let player_id = self
            .player_id
            .clone()
            .filter(PlayerId::is_valid)
            .ok_or(NotConnectable::MissingPlayerId)?;
        let name = self.name.trim();
        if name.is_empty() {
            return Err(NotConnectable::MissingName);
        }
        let avatar = self
            .avatar
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(NotConnectable::MissingAvatar)?;

        Ok(ConnectParams {
            code,
            player_id,
            name: name.to_string(),
            avatar: avatar.to_string(),
            mode: self.mode,
        })
    }
}

/// A validated, connectable identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub code: SessionCode,
    pub player_id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub mode: JoinMode,
}

impl ConnectParams {
    /// `{server}/ws/{CODE}/{player_id}?name=…&avatar=…&mode=…`
    ///
    /// Any path already on `server` is kept as a prefix.
    pub fn url(&self, server: &Url) -> Url {
        let mut url = server.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["ws", self.code.as_str(), self.player_id.as_str()]);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("name", &self.name)
            .append_pair("avatar", &self.avatar)
            .append_pair("mode", self.mode.as_str());
        url
    }

    /// Same identity, rejoining rather than creating.
    pub fn rejoin(mut self) -> Self {
        self.mode = JoinMode::Join;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> JoinIntent {
        JoinIntent {
            code: " abc123 ".into(),
            player_id: Some(PlayerId::new("p-1")),
            name: "Ada L".into(),
            avatar: Some("🦊".into()),
            mode: JoinMode::Create,
            on_join_screen: false,
        }
    }

    #[test]
    fn test_connect_params_normalizes_code() {
        let params = intent().connect_params().expect("connectable");
        assert_eq!(params.code.as_str(), "ABC123");
        assert_eq!(params.name, "Ada L");
    }

    #[test]
    fn test_each_missing_field_blocks_connection() {
        let mut on_screen = intent();
        on_screen.on_join_screen = true;
        assert_eq!(on_screen.connect_params(), Err(NotConnectable::OnJoinScreen));

        let mut bad_code = intent();
        bad_code.code = "ab".into();
        assert!(matches!(
            bad_code.connect_params(),
            Err(NotConnectable::InvalidCode(_))
        ));

        let mut no_id = intent();
        no_id.player_id = Some(PlayerId::new("  "));
        assert_eq!(no_id.connect_params(), Err(NotConnectable::MissingPlayerId));

        let mut no_name = intent();
        no_name.name = "   ".into();
        assert_eq!(no_name.connect_params(), Err(NotConnectable::MissingName));

        let mut no_avatar = intent();
        no_avatar.avatar = None;
        assert_eq!(no_avatar.connect_params(), Err(NotConnectable::MissingAvatar));
    }

    #[test]
    fn test_url_layout() {
        let params = intent().connect_params().expect("connectable");
        let server = Url::parse("ws://localhost:8000").expect("url");
        assert_eq!(
            params.url(&server).as_str(),
            "ws://localhost:8000/ws/ABC123/p-1?name=Ada+L&avatar=%F0%9F%A6%8A&mode=create"
        );

        let prefixed = Url::parse("wss://games.example.com/grid/").expect("url");
        let url = params.rejoin().url(&prefixed);
        assert_eq!(url.path(), "/grid/ws/ABC123/p-1");
        assert_eq!(url.query_pairs().find(|(k, _)| k == "mode").map(|(_, v)| v.into_owned()), Some("join".to_string()));
    }
}
