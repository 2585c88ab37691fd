use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("was {}", env!("CARGO_PKG_VERSION"));
    if args.extended {
        println!("target: {}", env!("WAS_BUILD_TARGET"));
        println!("max_body_size: {}", was_simple::DEFAULT_MAX_BODY_SIZE);
        println!("max_frame_payload: {}", was_frame::MAX_PAYLOAD);
    }
    Ok(SUCCESS)
}
