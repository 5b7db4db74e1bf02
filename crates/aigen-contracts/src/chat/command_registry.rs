#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "new",
        action: "new_chat",
    },
    CommandSpec {
        command: "threads",
        action: "list_threads",
    },
    CommandSpec {
        command: "close",
        action: "close_image",
    },
    CommandSpec {
        command: "shots",
        action: "show_shots",
    },
    CommandSpec {
        command: "refresh",
        action: "refresh",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

/// Commands taking a 1-based position.
pub(crate) const INDEX_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "detach",
        action: "remove_image",
    },
    CommandSpec {
        command: "view",
        action: "view_image",
    },
    CommandSpec {
        command: "retry",
        action: "retry_image",
    },
];

pub(crate) const OPEN_COMMAND: CommandSpec = CommandSpec {
    command: "open",
    action: "select_thread",
};

pub(crate) const ATTACH_COMMAND: CommandSpec = CommandSpec {
    command: "attach",
    action: "attach_images",
};

/// Attaches raw image bytes from a file, typed by content rather than name.
pub(crate) const PASTE_COMMAND: CommandSpec = CommandSpec {
    command: "paste",
    action: "paste_image",
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/new",
    "/threads",
    "/open <n|id>",
    "/attach <paths>",
    "/paste <path>",
    "/detach <n>",
    "/view <n>",
    "/close",
    "/retry <n>",
    "/shots",
    "/refresh",
    "/help",
    "/quit",
];
