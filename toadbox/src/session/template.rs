use crate::constants::desktop;

/// Parameters of the default session script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTemplate {
    pub account: String,
    pub background: String,
    pub window_manager: String,
}

impl SessionTemplate {
    pub fn for_account(account: &str) -> Self {
        Self {
            account: account.to_string(),
            background: desktop::BACKGROUND_COLOR.to_string(),
            window_manager: desktop::WINDOW_MANAGER.to_string(),
        }
    }

    /// Render the script. The window manager is exec'd last so it becomes
    /// the session's foreground process.
    pub fn render(&self) -> String {
        format!(
            r#"#!/bin/sh
# Desktop session for {account}. Provisioned once; local edits are kept.

unset SESSION_MANAGER
unset DBUS_SESSION_BUS_ADDRESS

export XDG_RUNTIME_DIR="/tmp/runtime-{account}"
mkdir -p "$XDG_RUNTIME_DIR"
chmod 700 "$XDG_RUNTIME_DIR"

if command -v dbus-launch >/dev/null 2>&1; then
    eval "$(dbus-launch --sh-syntax --exit-with-session)"
fi

xsetroot -solid "{background}" 2>/dev/null || true

exec {window_manager}
"#,
            account = self.account,
            background = self.background,
            window_manager = self.window_manager,
        )
    }
}
