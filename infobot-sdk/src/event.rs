//! Events emitted by the IRC client for the bot layer to consume.

/// Events that the SDK emits to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// TCP connection is up; registration has been sent.
    Connected,

    /// IRC registration complete (RPL_WELCOME). `nick` is our confirmed nick.
    Registered {
        nick: String,
        /// Welcome text sent by the server.
        welcome: String,
    },

    /// The nick we asked for is taken (ERR_NICKNAMEINUSE).
    NickInUse {
        nick: String,
    },

    /// Joined a channel.
    Joined {
        channel: String,
        nick: String,
    },

    /// A PRIVMSG in a channel or a private message.
    Message {
        from: String,
        target: String,
        text: String,
    },

    /// A NOTICE from a user, to a channel or to us.
    Notice {
        from: String,
        target: String,
        text: String,
    },

    /// Someone was kicked from a channel.
    Kicked {
        channel: String,
        nick: String,
        by: String,
        reason: String,
    },

    /// A user changed nick.
    NickChanged {
        old_nick: String,
        new_nick: String,
    },

    /// Server sent an error numeric or a notice.
    ServerNotice {
        text: String,
    },

    /// Connection was closed.
    Disconnected {
        reason: String,
    },
}
