use super::ConfigMap;

/// The built-in input: five subnets spread across two VPCs
pub fn sample_config_maps() -> Vec<ConfigMap> {
    [
        ("subnet-az1a", "vpc-12345", "ap-northeast-1a", "subnet-aaa111", "10.0.1.0/24", "Subnet in AZ 1a"),
        ("subnet-az1c", "vpc-12345", "ap-northeast-1c", "subnet-ccc333", "10.0.3.0/24", "Subnet in AZ 1c"),
        ("subnet-az1d", "vpc-12345", "ap-northeast-1d", "subnet-ddd444", "10.0.4.0/24", "Subnet in AZ 1d"),
        ("subnet-vpc2-az1a", "vpc-67890", "ap-northeast-1a", "subnet-bbb222", "192.168.1.0/24", "Subnet in VPC2 AZ 1a"),
        ("subnet-vpc2-az1c", "vpc-67890", "ap-northeast-1c", "subnet-eee555", "192.168.2.0/24", "Subnet in VPC2 AZ 1c"),
    ]
    .into_iter()
    .map(|(name, vpc_id, az, subnet_id, cidr, description)| {
        ConfigMap::new(name)
            .with_namespace("default")
            .with_label("vpc-id", vpc_id)
            .with_label("az", az)
            .with_data("subnet-id", subnet_id)
            .with_data("cidr-block", cidr)
            .with_data("description", description)
    })
    .collect()
}
