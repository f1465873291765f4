//! Run codec and filter generation across a resolved network.

use crate::ast::ResolvedNetwork;
use crate::codec::{generate_codec, CodecDescription, CodecError};
use crate::filter::{generate_filter_mask, AcceptanceFilter, FilterError};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("board {board}: {source}")]
    Filter {
        board: String,
        #[source]
        source: FilterError,
    },
}

/// Codecs of one bus, in message declaration order.
#[derive(Debug, Clone)]
pub struct BusCodecs {
    pub bus: String,
    pub is_extended: bool,
    pub codecs: Vec<CodecDescription>,
}

/// Receive filter of one programmed board on one bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardFilter {
    pub board: String,
    pub bus: String,
    /// `AcceptanceFilter::accept_all()` for buses the board only publishes on.
    pub filter: AcceptanceFilter,
    pub subscribed: bool,
}

/// Everything the emitter needs: all codecs and all board filters.
#[derive(Debug, Clone)]
pub struct GeneratedLibrary {
    pub network: ResolvedNetwork,
    pub buses: Vec<BusCodecs>,
    pub filters: Vec<BoardFilter>,
}

impl GeneratedLibrary {
    pub fn codec(&self, message: &str) -> Option<&CodecDescription> {
        self.buses
            .iter()
            .flat_map(|b| b.codecs.iter())
            .find(|c| c.message == message)
    }

    pub fn bus(&self, name: &str) -> Option<&BusCodecs> {
        self.buses.iter().find(|b| b.bus == name)
    }

    pub fn filters_for(&self, board: &str) -> impl Iterator<Item = &BoardFilter> {
        let board = board.to_string();
        self.filters.iter().filter(move |f| f.board == board)
    }
}

/// Generate every codec and every programmed board's filters.
pub fn generate(resolved: ResolvedNetwork) -> Result<GeneratedLibrary, GenerateError> {
    let network = &resolved.network;
    let mut buses = Vec::with_capacity(network.buses.len());
    for bus in &network.buses {
        let mut codecs = Vec::with_capacity(bus.messages.len());
        for m in &bus.messages {
            let codec = generate_codec(m, &network.enums)?;
            info!(
                bus = %bus.name,
                message = %m.name,
                identifier = m.identifier,
                payload = codec.payload_byte_length,
                "generated codec"
            );
            codecs.push(codec);
        }
        buses.push(BusCodecs {
            bus: bus.name.clone(),
            is_extended: bus.is_extended,
            codecs,
        });
    }

    let mut filters = Vec::new();
    for board in network.boards.iter().filter(|b| b.is_programmed()) {
        for usage in &board.subscribe {
            let Some(bus) = resolved.get_bus(&usage.bus) else {
                continue;
            };
            let subscribed = resolved.subscribed_messages(board, bus);
            let filter = generate_filter_mask(bus, &subscribed).map_err(|source| GenerateError::Filter {
                board: board.name.clone(),
                source,
            })?;
            info!(board = %board.name, bus = %bus.name, mask = filter.mask, "generated filter");
            filters.push(BoardFilter {
                board: board.name.clone(),
                bus: bus.name.clone(),
                filter,
                subscribed: true,
            });
        }
        // Buses the board only publishes on still need an init, without filtering.
        for usage in &board.publish {
            if board.subscriptions(&usage.bus).is_none() {
                filters.push(BoardFilter {
                    board: board.name.clone(),
                    bus: usage.bus.clone(),
                    filter: AcceptanceFilter::accept_all(),
                    subscribed: false,
                });
            }
        }
    }

    Ok(GeneratedLibrary {
        network: resolved,
        buses,
        filters,
    })
}
