// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Request building and response correlation for attribute operations.
//!
//! Encoding happens on the caller's side so conversion errors surface
//! before anything is queued. Decoding and result correlation run on the
//! worker once the backend has answered.

use ualink_core::{
    AttributeId, AttributeMask, AttributeSet, CodecResult, NodeId, StatusCode, TypeTag, UaError,
    UaResult, Value, ValueCodec, WireVariant,
};

use crate::backend::{Request, Response};

/// Attribute read, write, browse and call helpers.
pub(crate) struct AttributeService;

impl AttributeService {
    /// Encodes a value for writing to `attribute`.
    ///
    /// Attributes other than Value have a fixed wire type that overrides
    /// `value_type`.
    pub(crate) fn encode_write(
        attribute: AttributeId,
        value: &Value,
        value_type: Option<TypeTag>,
    ) -> CodecResult<WireVariant> {
        let tag = attribute.wire_type().or(value_type);
        ValueCodec::encode(value, tag)
    }

    pub(crate) fn read_request(node: &NodeId, attributes: AttributeMask) -> Request {
        Request::Read {
            node: node.clone(),
            attributes: attributes.iter().collect(),
        }
    }

    /// Pairs each requested attribute with its result.
    ///
    /// A value that cannot be decoded is reported per attribute with
    /// `BadDataEncodingUnsupported` instead of failing the whole read.
    pub(crate) fn read_result(
        node: &NodeId,
        attributes: AttributeMask,
        response: Response,
    ) -> UaResult<AttributeSet> {
        let values = match response {
            Response::Read(values) => values,
            other => return Err(unexpected(node, "read", &other)),
        };
        if values.len() != attributes.len() {
            return Err(UaError::protocol(format!(
                "read of {node}: {} results for {} attributes",
                values.len(),
                attributes.len()
            )));
        }

        let mut set = AttributeSet::new();
        for (attribute, data) in attributes.iter().zip(values) {
            let (value, status) = match data.value {
                Some(wire) if !data.status.is_bad() => match ValueCodec::decode(&wire) {
                    Ok(value) => (Some(value), data.status),
                    Err(err) => {
                        tracing::warn!(node = %node, attribute = %attribute, error = %err, "Attribute value not decodable");
                        (None, StatusCode::BAD_DATA_ENCODING_UNSUPPORTED)
                    }
                },
                _ => (None, data.status),
            };
            set.insert(attribute, value, status);
        }
        Ok(set)
    }

    pub(crate) fn write_result(
        node: &NodeId,
        attributes: &[AttributeId],
        response: Response,
    ) -> UaResult<Vec<(AttributeId, StatusCode)>> {
        let statuses = match response {
            Response::Write(statuses) => statuses,
            other => return Err(unexpected(node, "write", &other)),
        };
        if statuses.len() != attributes.len() {
            return Err(UaError::protocol(format!(
                "write of {node}: {} results for {} attributes",
                statuses.len(),
                attributes.len()
            )));
        }
        Ok(attributes.iter().copied().zip(statuses).collect())
    }

    pub(crate) fn browse_result(node: &NodeId, response: Response) -> UaResult<Vec<NodeId>> {
        match response {
            Response::Browse { status, children } if status.is_success() => Ok(children),
            Response::Browse { status, .. } => Err(UaError::from_status(status, node.to_string())),
            other => Err(unexpected(node, "browse", &other)),
        }
    }

    pub(crate) fn call_result(method: &NodeId, response: Response) -> UaResult<Vec<Value>> {
        match response {
            Response::Call { status, outputs } if status.is_success() => Ok(outputs
                .iter()
                .map(ValueCodec::decode)
                .collect::<CodecResult<Vec<_>>>()?),
            Response::Call { status, .. } => Err(UaError::from_status(status, method.to_string())),
            other => Err(unexpected(method, "call", &other)),
        }
    }
}

fn unexpected(node: &NodeId, expected: &str, response: &Response) -> UaError {
    UaError::protocol(format!(
        "{expected} of {node} answered with a {} response",
        response.operation()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DataValue;
    use ualink_core::{ErrorKind, LocalizedText, WireScalar};

    fn node() -> NodeId {
        NodeId::string(3, "TestNode.ReadWrite")
    }

    #[test]
    fn test_fixed_attribute_type_wins() {
        let wire = AttributeService::encode_write(
            AttributeId::DisplayName,
            &Value::from("NewDisplayName"),
            Some(TypeTag::Double),
        )
        .unwrap();
        assert_eq!(wire.type_tag(), Some(TypeTag::LocalizedText));
    }

    #[test]
    fn test_value_attribute_uses_requested_type() {
        let wire =
            AttributeService::encode_write(AttributeId::Value, &Value::Int32(3), Some(TypeTag::Byte))
                .unwrap();
        assert_eq!(wire, WireVariant::Scalar(WireScalar::Byte(3)));
    }

    #[test]
    fn test_read_request_in_attribute_order() {
        let mask = AttributeMask::from(AttributeId::Value) | AttributeMask::from(AttributeId::NodeId);
        let Request::Read { attributes, .. } = AttributeService::read_request(&node(), mask) else {
            panic!("not a read");
        };
        assert_eq!(attributes, vec![AttributeId::NodeId, AttributeId::Value]);
    }

    #[test]
    fn test_read_result_keeps_statuses() {
        let mask = AttributeId::DisplayName | AttributeId::Value;
        let response = Response::Read(vec![
            DataValue::good(WireVariant::Scalar(WireScalar::LocalizedText {
                locale: "en".into(),
                text: "ReadWrite".into(),
            })),
            DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN),
        ]);
        let set = AttributeService::read_result(&node(), mask, response).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.value(AttributeId::DisplayName),
            Some(&Value::LocalizedText(LocalizedText::new("en", "ReadWrite")))
        );
        assert_eq!(set.value(AttributeId::Value), None);
        assert_eq!(set.status(AttributeId::Value), Some(StatusCode::BAD_NODE_ID_UNKNOWN));
    }

    #[test]
    fn test_read_result_length_mismatch() {
        let mask = AttributeId::DisplayName | AttributeId::Value;
        let response = Response::Read(vec![DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN)]);
        let err = AttributeService::read_result(&node(), mask, response).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolError);
    }

    #[test]
    fn test_undecodable_value_is_per_attribute() {
        let mask = AttributeMask::from(AttributeId::Value);
        let response = Response::Read(vec![DataValue::good(WireVariant::Array {
            element_type: TypeTag::Double,
            elements: vec![WireScalar::Double(1.5), WireScalar::Int32(1)],
        })]);
        let set = AttributeService::read_result(&node(), mask, response).unwrap();
        assert_eq!(
            set.status(AttributeId::Value),
            Some(StatusCode::BAD_DATA_ENCODING_UNSUPPORTED)
        );
    }

    #[test]
    fn test_write_result_pairs_in_order() {
        let response = Response::Write(vec![StatusCode::GOOD, StatusCode::BAD_USER_ACCESS_DENIED]);
        let result = AttributeService::write_result(
            &node(),
            &[AttributeId::DisplayName, AttributeId::Value],
            response,
        )
        .unwrap();
        assert_eq!(
            result,
            vec![
                (AttributeId::DisplayName, StatusCode::GOOD),
                (AttributeId::Value, StatusCode::BAD_USER_ACCESS_DENIED),
            ]
        );
    }

    #[test]
    fn test_browse_bad_status_is_node_error() {
        let response = Response::Browse {
            status: StatusCode::BAD_NODE_ID_UNKNOWN,
            children: vec![],
        };
        let err = AttributeService::browse_result(&node(), response).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NodeError);
    }

    #[test]
    fn test_call_decodes_outputs() {
        let response = Response::Call {
            status: StatusCode::GOOD,
            outputs: vec![WireVariant::Scalar(WireScalar::Double(12.0))],
        };
        let outputs =
            AttributeService::call_result(&NodeId::string(3, "Test.Method.Multiply"), response)
                .unwrap();
        assert_eq!(outputs, vec![Value::Double(12.0)]);
    }

    #[test]
    fn test_mismatched_response_is_protocol_error() {
        let err = AttributeService::call_result(&node(), Response::Write(vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolError);
    }
}
