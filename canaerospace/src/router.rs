//! Classification of an incoming message id into its delivery pipeline.

use crate::types::{message_id_range, RoutingGroup};

/// Classify a message id into its routing group.
///
/// Grounded on `core.c`'s `_detectMessageGroup`: every one of the seven ranges maps to
/// exactly one group; an id outside all of them has no group at all and is reported to
/// the caller as [`crate::error::Error::BadMessageId`].
pub fn classify(msg_id: u16) -> Option<RoutingGroup> {
    use message_id_range::*;
    if EMERGENCY_EVENT.contains(&msg_id)
        || USER_DEFINED_HIGH.contains(&msg_id)
        || NORMAL_OPERATION.contains(&msg_id)
        || USER_DEFINED_LOW.contains(&msg_id)
        || DEBUG_SERVICE.contains(&msg_id)
    {
        return Some(RoutingGroup::Parameter);
    }
    if NODE_SERVICE_HIGH.contains(&msg_id) || NODE_SERVICE_LOW.contains(&msg_id) {
        return Some(RoutingGroup::Service);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_and_operation_ids_route_to_parameter() {
        assert_eq!(classify(0), Some(RoutingGroup::Parameter));
        assert_eq!(classify(127), Some(RoutingGroup::Parameter));
        assert_eq!(classify(1800), Some(RoutingGroup::Parameter));
        assert_eq!(classify(1999), Some(RoutingGroup::Parameter));
    }

    #[test]
    fn node_service_ids_route_to_service() {
        assert_eq!(classify(128), Some(RoutingGroup::Service));
        assert_eq!(classify(199), Some(RoutingGroup::Service));
        assert_eq!(classify(2000), Some(RoutingGroup::Service));
        assert_eq!(classify(2031), Some(RoutingGroup::Service));
    }

    #[test]
    fn gap_between_node_service_low_and_2047_is_unclassified() {
        assert_eq!(classify(2032), None);
        assert_eq!(classify(2047), None);
    }
}
