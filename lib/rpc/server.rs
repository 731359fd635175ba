use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::{
    model::RecordId,
    normalize::ipv4_str_to_int,
    query::{QueryError, QueryResult as CoreQueryResult, QuerySurface},
    snapshot::Snapshot,
};

use super::proto::{
    registry_server::Registry, DecisionQuery, DomainSuffixQuery, Empty, IdQuery, Ipv4Query, Ipv6Query, Match,
    OrgQuery, PingResult, QueryResult, StringQuery, SummaryResult,
};

pub struct Server {
    snapshot: Arc<Snapshot>,
}

impl Server {
    pub fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { snapshot }
    }

    fn query(&self) -> QuerySurface<'_> {
        QuerySurface::new(&self.snapshot)
    }
}

fn into_response(result: Result<CoreQueryResult, QueryError>) -> Result<Response<QueryResult>, Status> {
    let result = result.map_err(|err| Status::unavailable(err.to_string()))?;

    Ok(Response::new(QueryResult {
        registry_update_time: result.registry_update_time,
        normalized_query: result.normalized_query,
        matches: result
            .matches
            .into_iter()
            .map(|m| Match {
                id: m.id,
                payload_json: m.payload.to_string(),
                matched_attribute: m.matched_attribute,
            })
            .collect(),
    }))
}

fn parse_ipv6(address: &str) -> Result<[u8; 16], Status> {
    address
        .parse::<std::net::Ipv6Addr>()
        .map(|addr| addr.octets())
        .map_err(|_| Status::invalid_argument(format!("not a valid IPv6 address: {address}")))
}

#[tonic::async_trait]
impl Registry for Server {
    async fn search_by_id(&self, request: Request<IdQuery>) -> Result<Response<QueryResult>, Status> {
        let id: RecordId = request.into_inner().id;
        into_response(self.query().search_by_id(id))
    }

    async fn search_by_decision(&self, request: Request<DecisionQuery>) -> Result<Response<QueryResult>, Status> {
        let fingerprint = request.into_inner().fingerprint;
        into_response(self.query().search_by_decision(fingerprint))
    }

    async fn search_ipv4(&self, request: Request<Ipv4Query>) -> Result<Response<QueryResult>, Status> {
        let address = request.into_inner().address;
        into_response(self.query().search_ipv4(ipv4_str_to_int(&address)))
    }

    async fn search_ipv6(&self, request: Request<Ipv6Query>) -> Result<Response<QueryResult>, Status> {
        let address = parse_ipv6(&request.into_inner().address)?;
        into_response(self.query().search_ipv6(address))
    }

    async fn search_url(&self, request: Request<StringQuery>) -> Result<Response<QueryResult>, Status> {
        let value = request.into_inner().value;
        into_response(self.query().search_url(&value))
    }

    async fn search_domain(&self, request: Request<StringQuery>) -> Result<Response<QueryResult>, Status> {
        let value = request.into_inner().value;
        into_response(self.query().search_domain(&value))
    }

    async fn search_domain_suffix(
        &self,
        request: Request<DomainSuffixQuery>,
    ) -> Result<Response<QueryResult>, Status> {
        let request = request.into_inner();
        into_response(self.query().search_domain_suffix(&request.domain, request.variant as u8))
    }

    async fn search_entry_type(&self, request: Request<StringQuery>) -> Result<Response<QueryResult>, Status> {
        let value = request.into_inner().value;
        into_response(self.query().search_entry_type(&value))
    }

    async fn search_org(&self, request: Request<OrgQuery>) -> Result<Response<QueryResult>, Status> {
        let fingerprint = request.into_inner().fingerprint;
        into_response(self.query().search_org(fingerprint))
    }

    async fn search_without_no(&self, _request: Request<Empty>) -> Result<Response<QueryResult>, Status> {
        into_response(self.query().search_without_no())
    }

    async fn ping(&self, _request: Request<Empty>) -> Result<Response<PingResult>, Status> {
        Ok(Response::new(PingResult { registry_update_time: self.query().ping() }))
    }

    async fn get_summary(&self, _request: Request<Empty>) -> Result<Response<SummaryResult>, Status> {
        let summary = self.query().summary();
        Ok(Response::new(SummaryResult {
            registry_update_time: summary.registry_update_time,
            record_count: summary.record_count as u64,
            ipv4_count: summary.ipv4_count as u64,
            ipv6_count: summary.ipv6_count as u64,
            subnet4_count: summary.subnet4_count as u64,
            subnet6_count: summary.subnet6_count as u64,
            url_count: summary.url_count as u64,
            domain_count: summary.domain_count as u64,
            public_suffix_count: summary.public_suffix_count as u64,
            decision_count: summary.decision_count as u64,
            entry_type_count: summary.entry_type_count as u64,
            org_count: summary.org_count as u64,
            without_no_count: summary.without_no_count as u64,
            largest_index_name: summary.largest_index_name.unwrap_or_default().to_string(),
            largest_index_key: summary.largest_index_key.unwrap_or_default(),
            largest_index_cardinality: summary.largest_index_cardinality as u64,
            added: summary.added as u64,
            updated: summary.updated as u64,
            removed: summary.removed as u64,
        }))
    }
}
