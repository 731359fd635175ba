//! The gRPC binding (§6, Component H): a `tonic` service exposing every
//! operation on [`crate::query::QuerySurface`] over the wire, the way
//! `api/server.rs` exposes statistics over warp and `dns/server.rs`
//! exposes the resolver over trust-dns.

pub mod server;

pub mod proto {
    tonic::include_proto!("regsnap");
}
