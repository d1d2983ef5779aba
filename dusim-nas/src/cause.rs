//! 5GMM and 5GSM cause values (TS 24.501 Sections 9.11.3.2 and 9.11.4.2)

/// 5GMM causes referenced by the UE.
pub mod mm {
    pub const ILLEGAL_UE: u8 = 3;
    pub const MAC_FAILURE: u8 = 20;
    pub const SYNCH_FAILURE: u8 = 21;
    pub const UE_SECURITY_CAPABILITIES_MISMATCH: u8 = 23;
    pub const SECURITY_MODE_REJECTED_UNSPECIFIED: u8 = 24;
    pub const NGKSI_ALREADY_IN_USE: u8 = 71;
    pub const PROTOCOL_ERROR_UNSPECIFIED: u8 = 111;
}

/// 5GSM causes referenced by the UE.
pub mod sm {
    pub const INSUFFICIENT_RESOURCES: u8 = 26;
    pub const MISSING_OR_UNKNOWN_DNN: u8 = 27;
    pub const REGULAR_DEACTIVATION: u8 = 36;
    pub const INVALID_PDU_SESSION_IDENTITY: u8 = 43;
    pub const PTI_MISMATCH: u8 = 47;
    pub const PROTOCOL_ERROR_UNSPECIFIED: u8 = 111;
}

/// Human readable 5GMM cause.
pub fn mm_cause_str(cause: u8) -> &'static str {
    match cause {
        3 => "Illegal UE",
        5 => "PEI not accepted",
        6 => "Illegal ME",
        7 => "5GS services not allowed",
        9 => "UE identity cannot be derived by the network",
        10 => "Implicitly de-registered",
        11 => "PLMN not allowed",
        12 => "Tracking area not allowed",
        13 => "Roaming not allowed in this tracking area",
        15 => "No suitable cells in tracking area",
        20 => "MAC failure",
        21 => "Synch failure",
        22 => "Congestion",
        23 => "UE security capabilities mismatch",
        24 => "Security mode rejected, unspecified",
        26 => "Non-5G authentication unacceptable",
        27 => "N1 mode not allowed",
        28 => "Restricted service area",
        43 => "LADN not available",
        65 => "Maximum number of PDU sessions reached",
        67 => "Insufficient resources for specific slice and DNN",
        69 => "Insufficient resources for specific slice",
        71 => "ngKSI already in use",
        72 => "Non-3GPP access to 5GCN not allowed",
        73 => "Serving network not authorized",
        90 => "Payload was not forwarded",
        91 => "DNN not supported or not subscribed in the slice",
        92 => "Insufficient user-plane resources for the PDU session",
        95 => "Semantically incorrect message",
        96 => "Invalid mandatory information",
        97 => "Message type non-existent or not implemented",
        98 => "Message type not compatible with the protocol state",
        99 => "Information element non-existent or not implemented",
        100 => "Conditional IE error",
        101 => "Message not compatible with the protocol state",
        _ => "Protocol error, unspecified",
    }
}

/// Human readable 5GSM cause.
pub fn sm_cause_str(cause: u8) -> &'static str {
    match cause {
        8 => "Operator determined barring",
        26 => "Insufficient resources",
        27 => "Missing or unknown DNN",
        28 => "Unknown PDU session type",
        29 => "User authentication or authorization failed",
        31 => "Request rejected, unspecified",
        32 => "Service option not supported",
        33 => "Requested service option not subscribed",
        35 => "PTI already in use",
        36 => "Regular deactivation",
        38 => "Network failure",
        39 => "Reactivation requested",
        41 => "Semantic error in the TFT operation",
        42 => "Syntactical error in the TFT operation",
        43 => "Invalid PDU session identity",
        44 => "Semantic errors in packet filter",
        45 => "Syntactical error in packet filter",
        46 => "Out of LADN service area",
        47 => "PTI mismatch",
        50 => "PDU session type IPv4 only allowed",
        51 => "PDU session type IPv6 only allowed",
        54 => "PDU session does not exist",
        67 => "Insufficient resources for specific slice and DNN",
        68 => "Not supported SSC mode",
        69 => "Insufficient resources for specific slice",
        70 => "Missing or unknown DNN in a slice",
        81 => "Invalid PTI value",
        82 => "Maximum data rate per UE for user-plane integrity protection is too low",
        83 => "Semantic error in the QoS operation",
        84 => "Syntactical error in the QoS operation",
        85 => "Invalid mapped EPS bearer identity",
        95 => "Semantically incorrect message",
        96 => "Invalid mandatory information",
        97 => "Message type non-existent or not implemented",
        98 => "Message type not compatible with the protocol state",
        99 => "Information element non-existent or not implemented",
        100 => "Conditional IE error",
        101 => "Message not compatible with the protocol state",
        111 => "Protocol error, unspecified",
        _ => "Unknown cause",
    }
}
