use thiserror::Error;

#[derive(Error, Debug)]
pub enum WscleanError {
    #[error("Could not parse '{0}' as a pixel scale; expected a number followed by one of: asec, amin, deg, masec")]
    BadScale(String),

    #[error("Got the pixel scale unit '{unit}', but could not parse the number in '{input}'")]
    BadScaleNumber { input: String, unit: &'static str },

    #[error("Invalid wsclean setting '{setting}' = {value}: {reason}")]
    InvalidSetting {
        setting: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Couldn't run '{executable}': {err}")]
    Spawn {
        executable: String,
        err: std::io::Error,
    },

    #[error("'{executable}' was killed by a signal")]
    Killed { executable: String },
}
