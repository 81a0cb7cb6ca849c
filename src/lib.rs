pub mod network;

pub use network::{ConsistencyError, Network};

pub mod builder;

pub use builder::TimetableBuilder;

pub mod footpaths;

pub use footpaths::{FootpathHubIndex, HubEntry};

pub mod journey;

pub use journey::{Journey, JourneyError, Leg};

pub mod raptor;

pub use raptor::{raptor_query, Raptor, RaptorConfig};

pub mod pareto;

pub use pareto::{Label, ParetoFront};

pub mod profile;

pub use profile::{Profile, ProfileConfig};

pub mod loader;

pub use loader::{LoadError, Query};

pub mod gtfs;

pub mod utils;
