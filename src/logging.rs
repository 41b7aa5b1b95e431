use std::io::Write;

const LOG_ENV: &str = "WORKLOG_LOG";

/// Install the stderr logger. Level comes from `WORKLOG_LOG` (default `warn`).
pub fn init() {
    let env = env_logger::Env::new().filter_or(LOG_ENV, "warn");
    let _ = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();
}
