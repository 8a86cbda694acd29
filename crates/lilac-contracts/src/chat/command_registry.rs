#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "discard",
        action: "discard_upload",
    },
    CommandSpec {
        command: "clear",
        action: "clear_context",
    },
    CommandSpec {
        command: "context",
        action: "show_context",
    },
    CommandSpec {
        command: "new",
        action: "new_chat",
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

pub(crate) const PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "attach",
        action: "attach",
    },
    CommandSpec {
        command: "upload",
        action: "attach",
    },
];

pub(crate) const SETTING_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "quality",
        action: "set_quality",
    },
    CommandSpec {
        command: "provider",
        action: "set_provider",
    },
];

pub const CHAT_HELP_COMMANDS: &[(&str, &str)] = &[
    ("/attach <path>...", "add image files to the context"),
    ("<empty line>", "send the pending upload without a prompt"),
    ("/discard", "drop the pending upload preview (context is kept)"),
    ("/clear", "reset the image context"),
    ("/context", "show the image context"),
    ("/quality <auto|low|medium|high>", "set the requested quality"),
    ("/provider <openai|gemini>", "switch image provider"),
    ("/new", "start a new chat"),
    ("/help", "show this help"),
    ("/quit", "leave the chat"),
];
