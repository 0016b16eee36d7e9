use crate::model::wire_enum::wire_enum;

wire_enum! {
    /// broker 管理的下游服务。线上只传字符串标签。
    pub enum Service {
        OpenAI => "openai",
        DeepSeek => "deepseek",
        Mathpix => "mathpix",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrokerError;
    use crate::model::WireEnum;

    #[test]
    fn every_service_round_trips() {
        for service in Service::all() {
            let encoded = sonic_rs::to_string(&service).unwrap();
            let decoded: Service = sonic_rs::from_str(&encoded).unwrap();
            assert_eq!(decoded, service);
            assert_eq!(service.to_string().parse::<Service>().unwrap(), service);
        }
    }

    #[test]
    fn serializes_to_declared_tag() {
        assert_eq!(sonic_rs::to_string(&Service::OpenAI).unwrap(), r#""openai""#);
        assert_eq!(Service::DeepSeek.as_str(), "deepseek");
        assert_eq!(Service::Mathpix.to_string(), "mathpix");
    }

    #[test]
    fn member_names_are_not_accepted_on_the_wire() {
        let err = "OpenAI".parse::<Service>().unwrap_err();
        assert!(matches!(err, BrokerError::UnknownEnumValue { kind: "Service", .. }));
    }
}
