use crate::entry::Visibility;

pub const PUBLIC_PARTITION: &str = "public-kb";
pub const TEAM_PARTITION: &str = "team-kb";
pub const PRIVATE_PARTITION_PREFIX: &str = "user-";

/// The single place partition membership is computed. Both the entry
/// synchronizer and the search engine must go through here so the two can
/// never disagree about where a point lives.
pub fn route(visibility: Visibility, owner_id: &str) -> String {
	match visibility {
		Visibility::Public => PUBLIC_PARTITION.to_string(),
		Visibility::Team => TEAM_PARTITION.to_string(),
		Visibility::Private => private_partition(owner_id),
	}
}

pub fn private_partition(owner_id: &str) -> String {
	format!("{PRIVATE_PARTITION_PREFIX}{owner_id}")
}

/// Partitions a requester may fan a search out to, restricted to the given
/// scopes. Always emitted in public, team, private order so cross-partition
/// ties and pagination stay deterministic.
pub fn search_partitions(scopes: &[Visibility], requester_id: &str) -> Vec<String> {
	let mut partitions = Vec::with_capacity(3);

	if scopes.contains(&Visibility::Public) {
		partitions.push(PUBLIC_PARTITION.to_string());
	}
	if scopes.contains(&Visibility::Team) {
		partitions.push(TEAM_PARTITION.to_string());
	}
	if scopes.contains(&Visibility::Private) {
		partitions.push(private_partition(requester_id));
	}

	partitions
}
