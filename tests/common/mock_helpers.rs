//! Mock construction helpers

use mockall::mock;
use uartium_rs::backend::LineSource;
use uartium_rs::error::{Result, UartiumError};

mock! {
    pub Source {}

    impl LineSource for Source {
        fn start(&mut self) -> Result<()>;
        fn stop(&mut self);
        fn read_line(&mut self) -> Result<Option<String>>;
    }
}

/// Source that starts cleanly, yields `lines` and then disconnects
pub fn scripted_source(lines: &[&str]) -> MockSource {
    let mut lines: std::collections::VecDeque<String> =
        lines.iter().map(|l| l.to_string()).collect();
    let mut mock = MockSource::new();
    mock.expect_start().times(1).returning(|| Ok(()));
    mock.expect_stop().times(1).return_const(());
    mock.expect_read_line().returning(move || match lines.pop_front() {
        Some(line) => Ok(Some(line)),
        None => Err(UartiumError::Disconnected("script finished".to_string())),
    });
    mock
}

/// Source that starts cleanly and never produces a line
pub fn idle_source() -> MockSource {
    let mut mock = MockSource::new();
    mock.expect_start().times(1).returning(|| Ok(()));
    mock.expect_stop().times(1).return_const(());
    mock.expect_read_line().returning(|| {
        std::thread::sleep(std::time::Duration::from_millis(1));
        Ok(None)
    });
    mock
}

/// Source whose `start` fails
pub fn failing_source() -> MockSource {
    let mut mock = MockSource::new();
    mock.expect_start()
        .times(1)
        .returning(|| Err(UartiumError::Source("port busy".to_string())));
    mock
}
