use coursenotes_core::{Navigator, NoticeKind, Notifier};

/// Prints controller notifications to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn format(kind: NoticeKind, message: &str) -> String {
        match kind {
            NoticeKind::Success => format!("✓ {}", message),
            NoticeKind::Error => format!("✗ {}", message),
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        let line = Self::format(kind, message);
        match kind {
            NoticeKind::Error => eprintln!("{}", line),
            NoticeKind::Success => println!("{}", line),
        }
    }
}

/// A CLI has no view to leave; the request is only logged.
#[derive(Debug, Default)]
pub struct CliNavigator;

impl Navigator for CliNavigator {
    fn navigate_home(&self) {
        tracing::info!("leaving profile view");
    }
}
