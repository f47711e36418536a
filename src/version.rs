use chrono::{DateTime, Local};

fn build_datetime() -> DateTime<Local> {
    let build_timestamp: i64 = env!("BUILD_TIME").parse().unwrap_or(0);
    DateTime::from_timestamp(build_timestamp, 0)
        .map(|utc| utc.with_timezone(&Local))
        .unwrap_or_else(Local::now)
}

pub fn get_version_info() -> &'static str {
    let info = format!(
        "voicebridge {}\n\
         Build Time: {}\n\
         Git Commit: {}\n\
         Git Branch: {}\n\
         Git Status: {}",
        env!("CARGO_PKG_VERSION"),
        build_datetime().format("%Y-%m-%d %H:%M:%S %Z"),
        env!("GIT_COMMIT_HASH"),
        env!("GIT_BRANCH"),
        env!("GIT_DIRTY"),
    );
    Box::leak(info.into_boxed_str())
}

pub fn get_short_version() -> &'static str {
    let version = env!("CARGO_PKG_VERSION");
    let git_commit = env!("GIT_COMMIT_HASH");
    let short = if env!("GIT_DIRTY") == "dirty" {
        format!("{}-{}-dirty", version, git_commit)
    } else {
        format!("{}-{}", version, git_commit)
    };
    Box::leak(short.into_boxed_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_strings() {
        assert!(get_version_info().starts_with("voicebridge "));
        assert!(get_short_version().starts_with(env!("CARGO_PKG_VERSION")));
    }
}
