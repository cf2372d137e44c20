pub mod config;
pub mod coordinates;
pub mod details;
pub mod errors;
pub mod geocode;
pub mod hours;
pub mod model;
pub mod name;
pub mod normalize;
pub mod pipeline;
pub mod places;
pub mod resolver;
pub mod similarity;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use config::ResolverConfig;
pub use errors::{AppError, AppResult, Degradation};
pub use hours::{DaySchedule, TimeSlot, WeeklySchedule};
pub use model::{CanonicalPlace, Coordinates, Resolution};
pub use pipeline::PlacePipeline;

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,place_resolver_lib=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}
